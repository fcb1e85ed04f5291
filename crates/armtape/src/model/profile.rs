use serde::{Deserialize, Serialize};

/// Name of the public Azure cloud environment.
pub const AZURE_CLOUD: &str = "AzureCloud";

/// Credential profile consumed by the CLI to address ARM.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Known subscriptions; at most one should be marked default.
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl Profile {
    /// The subscription marked default, falling back to the first one.
    pub fn default_subscription(&self) -> Option<&Subscription> {
        self.subscriptions
            .iter()
            .find(|sub| sub.is_default)
            .or_else(|| self.subscriptions.first())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub user: SubscriptionUser,
    pub tenant_id: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub is_default: bool,
    /// Cloud environment name (see [`CloudEnvironment`]).
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_certificate: Option<ManagementCertificate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUser {
    pub name: String,
    #[serde(rename = "type")]
    pub user_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementCertificate {
    pub key: String,
    pub cert: String,
}

fn default_state() -> String {
    "Enabled".to_string()
}

fn default_environment() -> String {
    AZURE_CLOUD.to_string()
}

/// Well-known cloud environments and their resource manager endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloudEnvironment {
    AzureCloud,
    AzureChinaCloud,
    AzureUsGovernment,
    AzureGermanCloud,
}

impl CloudEnvironment {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AzureCloud" => Some(Self::AzureCloud),
            "AzureChinaCloud" => Some(Self::AzureChinaCloud),
            "AzureUSGovernment" => Some(Self::AzureUsGovernment),
            "AzureGermanCloud" => Some(Self::AzureGermanCloud),
            _ => None,
        }
    }

    pub fn resource_manager_endpoint(self) -> &'static str {
        match self {
            Self::AzureCloud => "https://management.azure.com",
            Self::AzureChinaCloud => "https://management.chinacloudapi.cn",
            Self::AzureUsGovernment => "https://management.usgovcloudapi.net",
            Self::AzureGermanCloud => "https://management.microsoftazure.de",
        }
    }
}
