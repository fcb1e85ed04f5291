//! Scenario store: loading and validating replay fixtures.
//!
//! Fixtures are plain data (JSON or YAML). Loading is pure construction; any
//! structural problem is reported as `E_FIXTURE_LOAD` before a scenario runs.

use crate::error::{HarnessError, HarnessResult};
use crate::model::{InteractionGroup, ScenarioFixture, FIXTURE_VERSION};
use serde_json::json;
use std::fs;
use std::path::Path;
use url::Url;

/// Serialization format of a fixture document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureFormat {
    Json,
    Yaml,
}

impl FixtureFormat {
    /// Pick the format from a file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => FixtureFormat::Yaml,
            _ => FixtureFormat::Json,
        }
    }
}

pub fn load_fixture_file(path: &Path) -> HarnessResult<ScenarioFixture> {
    let data = fs::read_to_string(path).map_err(|err| {
        HarnessError::fixture_load(
            format!("failed to read fixture {}", path.display()),
            json!({ "path": path.display().to_string(), "source": err.to_string() }),
        )
    })?;
    load_fixture_str(&data, FixtureFormat::from_path(path))
}

pub fn load_fixture_str(data: &str, format: FixtureFormat) -> HarnessResult<ScenarioFixture> {
    let fixture: ScenarioFixture = match format {
        FixtureFormat::Yaml => serde_yml::from_str(data).map_err(|err| {
            HarnessError::fixture_load(
                "failed to parse yaml fixture",
                json!({ "source": err.to_string() }),
            )
        })?,
        FixtureFormat::Json => serde_json::from_str(data).map_err(|err| {
            HarnessError::fixture_load(
                "failed to parse json fixture",
                json!({ "source": err.to_string() }),
            )
        })?,
    };
    validate_fixture(&fixture)?;
    Ok(fixture)
}

pub fn write_fixture_file(path: &Path, fixture: &ScenarioFixture) -> HarnessResult<()> {
    let data = match FixtureFormat::from_path(path) {
        FixtureFormat::Yaml => serde_yml::to_string(fixture)
            .map_err(|err| HarnessError::protocol("failed to serialize fixture", err))?,
        FixtureFormat::Json => serde_json::to_string_pretty(fixture)
            .map_err(|err| HarnessError::protocol("failed to serialize fixture", err))?,
    };
    fs::write(path, data).map_err(|err| HarnessError::io("failed to write fixture", err))
}

pub fn validate_fixture(fixture: &ScenarioFixture) -> HarnessResult<()> {
    if fixture.fixture_version != FIXTURE_VERSION {
        return Err(HarnessError::fixture_load(
            "unsupported fixture version",
            json!({
                "provided_version": fixture.fixture_version,
                "supported_version": FIXTURE_VERSION,
            }),
        ));
    }
    if fixture.groups.is_empty() {
        return Err(HarnessError::fixture_load(
            "fixture has no interaction groups",
            None,
        ));
    }
    for (group_index, group) in fixture.groups.iter().enumerate() {
        validate_group(group_index, group)?;
    }
    validate_alternatives(&fixture.groups)
}

fn validate_group(group_index: usize, group: &InteractionGroup) -> HarnessResult<()> {
    if group.interactions.is_empty() {
        return Err(HarnessError::fixture_load(
            "interaction group is empty",
            json!({ "group": group_index }),
        ));
    }
    for (entry_index, entry) in group.interactions.iter().enumerate() {
        let url = Url::parse(&entry.request.url).map_err(|err| {
            HarnessError::fixture_load(
                "interaction url is not an absolute url",
                json!({
                    "group": group_index,
                    "entry": entry_index,
                    "url": entry.request.url,
                    "source": err.to_string(),
                }),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HarnessError::fixture_load(
                "interaction url must use http or https",
                json!({ "group": group_index, "entry": entry_index, "url": entry.request.url }),
            ));
        }
        if !(100..=599).contains(&entry.response.status) {
            return Err(HarnessError::fixture_load(
                "recorded status code is out of range",
                json!({
                    "group": group_index,
                    "entry": entry_index,
                    "status": entry.response.status,
                }),
            ));
        }
    }
    Ok(())
}

/// Alternatives that open with the same method and path are treated as
/// transport variants of one conversation, so they must agree on the method
/// wherever they share a path at the same position.
fn validate_alternatives(groups: &[InteractionGroup]) -> HarnessResult<()> {
    for (left_index, left) in groups.iter().enumerate() {
        for (offset, right) in groups.iter().skip(left_index + 1).enumerate() {
            let right_index = left_index + 1 + offset;
            if structural_key(left, 0) != structural_key(right, 0) {
                continue;
            }
            for (position, (a, b)) in left.interactions.iter().zip(&right.interactions).enumerate()
            {
                let same_path = url_path(&a.request.url) == url_path(&b.request.url);
                if same_path && a.request.method != b.request.method {
                    return Err(HarnessError::fixture_load(
                        "alternative groups disagree on the method for a duplicate url",
                        json!({
                            "groups": [left_index, right_index],
                            "entry": position,
                            "url": a.request.url,
                            "methods": [a.request.method.as_str(), b.request.method.as_str()],
                        }),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn structural_key(group: &InteractionGroup, index: usize) -> Option<(crate::model::HttpMethod, String)> {
    let entry = group.interactions.get(index)?;
    Some((entry.request.method, url_path(&entry.request.url)?))
}

fn url_path(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|parsed| parsed.path().to_string())
}

/// One-line description of every group, used by `fixture check`.
#[derive(Clone, Debug, serde::Serialize)]
pub struct FixtureSummary {
    pub name: String,
    pub environment: Vec<String>,
    pub subscriptions: usize,
    pub groups: Vec<GroupSummary>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct GroupSummary {
    pub label: Option<String>,
    pub interactions: Vec<String>,
}

pub fn summarize_fixture(fixture: &ScenarioFixture) -> FixtureSummary {
    FixtureSummary {
        name: fixture.name.clone(),
        environment: fixture.environment.keys().cloned().collect(),
        subscriptions: fixture.profile.subscriptions.len(),
        groups: fixture
            .groups
            .iter()
            .map(|group| GroupSummary {
                label: group.label.clone(),
                interactions: group
                    .interactions
                    .iter()
                    .map(|entry| {
                        format!(
                            "{} {} -> {}",
                            entry.request.method, entry.request.url, entry.response.status
                        )
                    })
                    .collect(),
            })
            .collect(),
    }
}
