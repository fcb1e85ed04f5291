//! Fluent builder APIs for constructing replay fixtures in tests.
//!
//! # Example
//!
//! ```ignore
//! use armtape_fixtures::{FixtureBuilder, GroupBuilder};
//!
//! let fixture = FixtureBuilder::new("nsg-show")
//!     .with_env("AZURE_VM_TEST_LOCATION", "eastus")
//!     .with_group(
//!         GroupBuilder::new("https")
//!             .get("https://management.azure.com/a", 200, r#"{"name":"a"}"#)
//!             .get("https://management.azure.com/b", 404, ""),
//!     )
//!     .build();
//! ```

use armtape::model::{
    BodyMatcher, Headers, HttpMethod, InteractionEntry, InteractionGroup, Profile,
    RecordedResponse, RequestMatcher, ScenarioFixture, Subscription, SubscriptionUser,
    AZURE_CLOUD, FIXTURE_VERSION,
};
use std::collections::BTreeMap;

/// Subscription id used by [`test_profile`].
pub const TEST_SUBSCRIPTION_ID: &str = "2c224e7e-3ef5-431d-a57b-e71f4662e3a6";

/// A one-subscription profile in the public cloud.
#[must_use]
pub fn test_profile(subscription_id: &str) -> Profile {
    Profile {
        subscriptions: vec![Subscription {
            id: subscription_id.to_string(),
            name: "Node CLI Test".to_string(),
            user: SubscriptionUser {
                name: "user@domain.example".to_string(),
                user_type: "user".to_string(),
            },
            tenant_id: "72f988bf-86f1-41af-91ab-2d7cd011db47".to_string(),
            state: "Enabled".to_string(),
            is_default: true,
            environment: AZURE_CLOUD.to_string(),
            management_certificate: None,
        }],
    }
}

// ============================================================================
// FixtureBuilder
// ============================================================================

/// Fluent builder for [`ScenarioFixture`]s.
///
/// Starts with the [`test_profile`] subscription and no environment.
#[derive(Debug, Clone)]
pub struct FixtureBuilder {
    name: String,
    profile: Profile,
    environment: BTreeMap<String, String>,
    groups: Vec<InteractionGroup>,
}

impl FixtureBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            profile: test_profile(TEST_SUBSCRIPTION_ID),
            environment: BTreeMap::new(),
            groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.environment.insert(key.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: GroupBuilder) -> Self {
        self.groups.push(group.build());
        self
    }

    #[must_use]
    pub fn build(self) -> ScenarioFixture {
        ScenarioFixture {
            fixture_version: FIXTURE_VERSION,
            name: self.name,
            description: None,
            profile: self.profile,
            environment: self.environment,
            groups: self.groups,
        }
    }
}

// ============================================================================
// GroupBuilder
// ============================================================================

/// Fluent builder for one [`InteractionGroup`].
#[derive(Debug, Clone)]
pub struct GroupBuilder {
    label: String,
    interactions: Vec<InteractionEntry>,
}

impl GroupBuilder {
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            interactions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, interaction: InteractionBuilder) -> Self {
        self.interactions.push(interaction.build());
        self
    }

    /// Shorthand for a bodiless GET interaction.
    #[must_use]
    pub fn get(self, url: &str, status: u16, body: &str) -> Self {
        self.with(InteractionBuilder::new(HttpMethod::Get, url).reply(status, body))
    }

    /// Shorthand for a bodiless DELETE interaction.
    #[must_use]
    pub fn delete(self, url: &str, status: u16, body: &str) -> Self {
        self.with(InteractionBuilder::new(HttpMethod::Delete, url).reply(status, body))
    }

    #[must_use]
    pub fn build(self) -> InteractionGroup {
        InteractionGroup {
            label: Some(self.label),
            interactions: self.interactions,
        }
    }
}

// ============================================================================
// InteractionBuilder
// ============================================================================

/// Fluent builder for one recorded request/response pair.
#[derive(Debug, Clone)]
pub struct InteractionBuilder {
    method: HttpMethod,
    url: String,
    body: Option<BodyMatcher>,
    status: u16,
    headers: Headers,
    response_body: String,
    delay_ms: Option<u64>,
}

impl InteractionBuilder {
    /// Defaults to an empty `200` response.
    #[must_use]
    pub fn new(method: HttpMethod, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            body: None,
            status: 200,
            headers: Headers::new(),
            response_body: String::new(),
            delay_ms: None,
        }
    }

    #[must_use]
    pub fn match_body(mut self, matcher: BodyMatcher) -> Self {
        self.body = Some(matcher);
        self
    }

    #[must_use]
    pub fn reply(mut self, status: u16, body: &str) -> Self {
        self.status = status;
        self.response_body = body.to_string();
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn delay_ms(mut self, delay: u64) -> Self {
        self.delay_ms = Some(delay);
        self
    }

    #[must_use]
    pub fn build(self) -> InteractionEntry {
        InteractionEntry {
            request: RequestMatcher {
                method: self.method,
                url: self.url,
                body: self.body,
            },
            response: RecordedResponse {
                status: self.status,
                headers: self.headers,
                body: self.response_body,
                delay_ms: self.delay_ms,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_group_and_entry_order() {
        let fixture = FixtureBuilder::new("order")
            .with_group(GroupBuilder::new("http").get("http://h/1", 200, ""))
            .with_group(
                GroupBuilder::new("https")
                    .get("https://h/1", 200, "")
                    .delete("https://h/1", 202, ""),
            )
            .build();

        assert_eq!(fixture.groups.len(), 2);
        assert_eq!(fixture.groups[1].label.as_deref(), Some("https"));
        assert_eq!(fixture.groups[1].interactions[1].request.method, HttpMethod::Delete);
        assert_eq!(fixture.interaction_count(), 3);
    }

    #[test]
    fn interaction_defaults_to_empty_ok() {
        let entry = InteractionBuilder::new(HttpMethod::Get, "https://h/x").build();
        assert_eq!(entry.response.status, 200);
        assert!(entry.response.body.is_empty());
        assert!(entry.request.body.is_none());
    }
}
