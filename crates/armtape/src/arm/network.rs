//! Network security group operations.

use super::{api_error, parse_json, resource_path, ArmClient};
use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

const PROVIDER: &str = "Microsoft.Network";
const KIND: &str = "networkSecurityGroups";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSecurityGroup {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: NsgProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsgProperties {
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub security_rules: Vec<SecurityRule>,
    #[serde(default)]
    pub default_security_rules: Vec<SecurityRule>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    pub name: String,
}

/// Result of [`delete_nsg`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The user declined the confirmation prompt.
    Declined,
}

pub fn nsg_path(subscription_id: &str, resource_group: &str, name: &str) -> String {
    resource_path(subscription_id, resource_group, PROVIDER, KIND, name)
}

/// Fetch a network security group; `None` when it does not exist.
pub fn show_nsg(
    client: &ArmClient<'_>,
    resource_group: &str,
    name: &str,
) -> HarnessResult<Option<NetworkSecurityGroup>> {
    let response = client.get(&nsg_path(client.subscription_id(), resource_group, name))?;
    match response.status {
        404 => Ok(None),
        200 => parse_json(&response.body).map(Some),
        _ => Err(api_error(&response)),
    }
}

/// Delete a network security group and confirm it is gone.
///
/// `confirm` is asked before anything is deleted; pass a closure returning
/// `Ok(true)` to skip the prompt.
pub fn delete_nsg(
    client: &ArmClient<'_>,
    resource_group: &str,
    name: &str,
    confirm: &mut dyn FnMut(&str) -> HarnessResult<bool>,
) -> HarnessResult<DeleteOutcome> {
    if show_nsg(client, resource_group, name)?.is_none() {
        return Err(not_found(resource_group, name));
    }
    if !confirm(&format!("Delete network security group \"{name}\"? [y/n] "))? {
        return Ok(DeleteOutcome::Declined);
    }

    let path = nsg_path(client.subscription_id(), resource_group, name);
    let response = client.delete(&path)?;
    if !matches!(response.status, 200 | 202 | 204) {
        return Err(api_error(&response));
    }
    client.wait_for_operation(&response)?;

    if show_nsg(client, resource_group, name)?.is_some() {
        return Err(HarnessError::api(
            format!("network security group \"{name}\" still exists after delete"),
            json!({ "resource_group": resource_group, "name": name }),
        ));
    }
    info!(resource_group, name, "deleted network security group");
    Ok(DeleteOutcome::Deleted)
}

fn not_found(resource_group: &str, name: &str) -> HarnessError {
    HarnessError::api(
        format!(
            "A network security group with name \"{name}\" not found in the resource group \"{resource_group}\""
        ),
        json!({ "resource_group": resource_group, "name": name }),
    )
}
