//! Virtual machine and scale set operations.

use super::{api_error, parse_json, resource_path, ArmClient};
use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

const PROVIDER: &str = "Microsoft.Compute";
const KIND: &str = "virtualMachineScaleSets";
const VM_KIND: &str = "virtualMachines";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineScaleSet {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub sku: Option<Sku>,
    #[serde(default)]
    pub properties: Value,
}

impl VirtualMachineScaleSet {
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties.get("provisioningState")?.as_str()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub name: String,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub capacity: Option<u64>,
}

pub fn vmss_path(subscription_id: &str, resource_group: &str, name: &str) -> String {
    resource_path(subscription_id, resource_group, PROVIDER, KIND, name)
}

/// Create or update a scale set from a JSON parameter document, wait for the
/// operation and return the resulting resource.
pub fn create_or_update_vmss(
    client: &ArmClient<'_>,
    resource_group: &str,
    name: &str,
    parameters: &str,
) -> HarnessResult<VirtualMachineScaleSet> {
    serde_json::from_str::<Value>(parameters)
        .map_err(|err| HarnessError::protocol("parameter file is not valid json", err))?;

    let path = vmss_path(client.subscription_id(), resource_group, name);
    let response = client.put_json(&path, parameters)?;
    if !matches!(response.status, 200 | 201) {
        return Err(api_error(&response));
    }
    client.wait_for_operation(&response)?;

    let current = client.get(&path)?;
    if current.status != 200 {
        return Err(api_error(&current));
    }
    let scale_set: VirtualMachineScaleSet = parse_json(&current.body)?;
    info!(
        resource_group,
        name,
        state = scale_set.provisioning_state().unwrap_or("unknown"),
        "created or updated virtual machine scale set"
    );
    Ok(scale_set)
}

// =============================================================================
// Virtual machines
// =============================================================================

/// Reference to another resource by its ARM id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: VmProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    #[serde(default)]
    pub vm_id: Option<String>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub hardware_profile: Option<HardwareProfile>,
    #[serde(default)]
    pub availability_set: Option<SubResource>,
    #[serde(default)]
    pub network_profile: NetworkProfile,
    #[serde(default)]
    pub storage_profile: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub vm_size: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default)]
    pub network_interfaces: Vec<SubResource>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub properties: NicProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicProperties {
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfiguration {
    pub name: String,
    #[serde(default)]
    pub properties: IpConfigurationProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConfigurationProperties {
    #[serde(rename = "privateIPAddress", default)]
    pub private_ip_address: Option<String>,
    #[serde(rename = "publicIPAddress", default)]
    pub public_ip_address: Option<SubResource>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIpAddress {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub properties: PublicIpProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpProperties {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(rename = "publicIPAllocationMethod", default)]
    pub allocation_method: Option<String>,
    #[serde(default)]
    pub dns_settings: Option<DnsSettings>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsSettings {
    #[serde(default)]
    pub fqdn: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySet {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub properties: AvailabilitySetProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySetProperties {
    #[serde(default)]
    pub platform_update_domain_count: Option<u32>,
    #[serde(default)]
    pub platform_fault_domain_count: Option<u32>,
}

/// A virtual machine with the network and availability resources it uses.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VmDetails {
    pub virtual_machine: VirtualMachine,
    pub network_interfaces: Vec<NetworkInterface>,
    pub public_ip_addresses: Vec<PublicIpAddress>,
    pub availability_set: Option<AvailabilitySet>,
}

pub fn vm_path(subscription_id: &str, resource_group: &str, name: &str) -> String {
    resource_path(subscription_id, resource_group, PROVIDER, VM_KIND, name)
}

/// Fetch a virtual machine; `None` when it does not exist.
pub fn get_vm(
    client: &ArmClient<'_>,
    resource_group: &str,
    name: &str,
) -> HarnessResult<Option<VirtualMachine>> {
    let response = client.get(&vm_path(client.subscription_id(), resource_group, name))?;
    match response.status {
        404 => Ok(None),
        200 => parse_json(&response.body).map(Some),
        _ => Err(api_error(&response)),
    }
}

/// Show a virtual machine together with its network interfaces, their public
/// IP addresses and its availability set.
///
/// The VM is read twice: once to check it exists, then again as the root of
/// the reference walk. Recorded `vm show` sessions carry both reads.
pub fn show_vm(
    client: &ArmClient<'_>,
    resource_group: &str,
    name: &str,
) -> HarnessResult<Option<VmDetails>> {
    if get_vm(client, resource_group, name)?.is_none() {
        return Ok(None);
    }
    let Some(virtual_machine) = get_vm(client, resource_group, name)? else {
        return Err(HarnessError::api(
            format!("virtual machine \"{name}\" disappeared while it was being read"),
            serde_json::json!({ "resource_group": resource_group, "name": name }),
        ));
    };

    let mut network_interfaces = Vec::new();
    let mut public_ip_addresses = Vec::new();
    for reference in &virtual_machine.properties.network_profile.network_interfaces {
        let nic: NetworkInterface = get_reference(client, reference)?;
        for config in &nic.properties.ip_configurations {
            if let Some(ip) = &config.properties.public_ip_address {
                public_ip_addresses.push(get_reference(client, ip)?);
            }
        }
        network_interfaces.push(nic);
    }
    let availability_set = match &virtual_machine.properties.availability_set {
        Some(reference) => Some(get_reference::<AvailabilitySet>(client, reference)?),
        None => None,
    };
    debug!(
        resource_group,
        name,
        nics = network_interfaces.len(),
        public_ips = public_ip_addresses.len(),
        "resolved virtual machine references"
    );
    Ok(Some(VmDetails {
        virtual_machine,
        network_interfaces,
        public_ip_addresses,
        availability_set,
    }))
}

fn get_reference<T: serde::de::DeserializeOwned>(
    client: &ArmClient<'_>,
    reference: &SubResource,
) -> HarnessResult<T> {
    if !reference.id.starts_with("/subscriptions/") {
        return Err(HarnessError::protocol(
            "resource reference is not an arm id",
            &reference.id,
        ));
    }
    let response = client.get(&reference.id)?;
    if response.status != 200 {
        return Err(api_error(&response));
    }
    parse_json(&response.body)
}
