use crate::model::http::{Headers, HttpMethod};
use crate::model::profile::Profile;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Current fixture format version.
pub const FIXTURE_VERSION: u32 = 1;

/// A replayable description of one test's HTTP conversation plus the
/// environment and credential mocking it needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFixture {
    /// Format version for compatibility checking.
    pub fixture_version: u32,
    /// Scenario name, usually derived from the recorded test title.
    pub name: String,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Mocked credential profile installed for the run.
    #[serde(default)]
    pub profile: Profile,
    /// Environment variables visible to the system under test for the run.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Alternative interaction groups; exactly one is consumed per run.
    pub groups: Vec<InteractionGroup>,
}

impl ScenarioFixture {
    /// Total number of recorded interactions across all groups.
    pub fn interaction_count(&self) -> usize {
        self.groups.iter().map(|group| group.interactions.len()).sum()
    }
}

/// One complete, linear HTTP conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionGroup {
    /// Human-readable label, e.g. the transport scheme the group was recorded for.
    #[serde(default)]
    pub label: Option<String>,
    /// Interactions in the order they must be requested.
    pub interactions: Vec<InteractionEntry>,
}

/// A single recorded request matcher and the response to replay for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub request: RequestMatcher,
    pub response: RecordedResponse,
}

/// What an incoming request must look like to consume an entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestMatcher {
    /// Expected method.
    pub method: HttpMethod,
    /// Expected absolute URL (scheme, host, path and query, query order-sensitive).
    pub url: String,
    /// Optional body predicate; when absent the body is not compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyMatcher>,
}

/// Body predicate for a recorded request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum BodyMatcher {
    /// Matches every body, including an empty one.
    Any,
    /// Body text must be byte-for-byte equal.
    Exact { text: String },
    /// Body must parse as JSON and be structurally equal.
    Json { value: Value },
}

impl BodyMatcher {
    pub fn matches(&self, body: Option<&str>) -> bool {
        match self {
            BodyMatcher::Any => true,
            BodyMatcher::Exact { text } => body.unwrap_or_default() == text,
            BodyMatcher::Json { value } => body
                .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
                .is_some_and(|parsed| &parsed == value),
        }
    }
}

/// Response replayed verbatim when an entry matches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in recorded order.
    #[serde(default)]
    pub headers: Headers,
    /// Raw response body.
    #[serde(default)]
    pub body: String,
    /// Optional delay before the response is delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}
