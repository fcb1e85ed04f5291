//! Conversion of autogenerated nock recordings into replay fixtures.
//!
//! A recording is a JavaScript module exporting a mocked profile factory, an
//! environment setup function and a list of `nock(base)` interceptor chains.
//! The importer reads those pieces as data; it never evaluates JavaScript.

mod scanner;

use crate::error::{HarnessError, HarnessResult};
use crate::model::{
    BodyMatcher, Headers, HttpMethod, InteractionEntry, InteractionGroup, ManagementCertificate,
    Profile, RecordedResponse, RequestMatcher, ScenarioFixture, Subscription, SubscriptionUser,
    AZURE_CLOUD, FIXTURE_VERSION,
};
use regex::Regex;
use scanner::{JsValue, Scanner};
use std::collections::BTreeMap;
use tracing::debug;

const SUBSCRIPTION_CONSTRUCTOR: &str = "new profile.Subscription(";

/// Build a fixture from the source text of a nock recording.
pub fn import_nock(source: &str, name: &str) -> HarnessResult<ScenarioFixture> {
    let environment = parse_environment(source)?;
    let profile = parse_profile(source)?;
    let groups = parse_scopes(source)?;
    if groups.is_empty() {
        return Err(HarnessError::fixture_load(
            "recording contains no nock interceptors",
            None,
        ));
    }
    let fixture = ScenarioFixture {
        fixture_version: FIXTURE_VERSION,
        name: name.to_string(),
        description: Some("imported from a nock recording".to_string()),
        profile,
        environment,
        groups,
    };
    debug!(
        scenario = %fixture.name,
        groups = fixture.groups.len(),
        interactions = fixture.interaction_count(),
        "imported nock recording"
    );
    crate::fixture::validate_fixture(&fixture)?;
    Ok(fixture)
}

/// Scenario name for a recording file name: the stem without `.nock.js`.
pub fn scenario_name_from_file(file_name: &str) -> String {
    file_name
        .trim_end_matches(".js")
        .trim_end_matches(".nock")
        .to_string()
}

fn parse_environment(source: &str) -> HarnessResult<BTreeMap<String, String>> {
    let pattern = Regex::new(
        r#"process\.env\[\s*['"]([^'"]+)['"]\s*\]\s*=\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#,
    )
    .map_err(|err| HarnessError::protocol("invalid environment pattern", err))?;
    let mut environment = BTreeMap::new();
    for captures in pattern.captures_iter(source) {
        let key = captures.get(1).map_or("", |m| m.as_str());
        let value = captures
            .get(2)
            .or_else(|| captures.get(3))
            .map_or("", |m| m.as_str());
        environment.insert(key.to_string(), value.replace("\\\\", "\\"));
    }
    Ok(environment)
}

fn parse_profile(source: &str) -> HarnessResult<Profile> {
    let mut subscriptions = Vec::new();
    let mut search_from = 0;
    while let Some(found) = source
        .get(search_from..)
        .and_then(|rest| rest.find(SUBSCRIPTION_CONSTRUCTOR))
    {
        let start = search_from + found + SUBSCRIPTION_CONSTRUCTOR.len();
        let mut scanner = Scanner::new(source, start);
        let literal = scanner.value()?;
        let environment = if scanner.eat(b',') {
            environment_reference(&mut scanner)
        } else {
            None
        };
        subscriptions.push(subscription_from_literal(&literal, environment, &scanner)?);
        search_from = scanner.position();
    }
    Ok(Profile { subscriptions })
}

/// `newProfile.environments['AzureCloud']` -> `AzureCloud`
fn environment_reference(scanner: &mut Scanner<'_>) -> Option<String> {
    while scanner.ident().is_some() {
        if !scanner.eat(b'.') {
            break;
        }
    }
    if scanner.eat(b'[') {
        let name = scanner.string().ok();
        scanner.eat(b']');
        return name;
    }
    None
}

fn subscription_from_literal(
    literal: &JsValue,
    environment: Option<String>,
    scanner: &Scanner<'_>,
) -> HarnessResult<Subscription> {
    let text = |key: &str| literal.get(key).and_then(JsValue::as_str).map(str::to_string);
    let id = text("id").ok_or_else(|| scanner.error("subscription literal has no id"))?;
    let user = literal.get("user");
    let user_field = |key: &str| {
        user.and_then(|user| user.get(key))
            .and_then(JsValue::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let certificate = literal.get("managementCertificate").map(|cert| {
        let field = |key: &str| {
            cert.get(key)
                .and_then(JsValue::as_str)
                .unwrap_or_default()
                .to_string()
        };
        ManagementCertificate {
            key: field("key"),
            cert: field("cert"),
        }
    });
    Ok(Subscription {
        name: text("name").unwrap_or_else(|| id.clone()),
        id,
        user: SubscriptionUser {
            name: user_field("name"),
            user_type: user_field("type"),
        },
        tenant_id: text("tenantId").unwrap_or_default(),
        state: text("state").unwrap_or_else(|| "Enabled".to_string()),
        is_default: matches!(literal.get("isDefault"), Some(JsValue::Bool(true))),
        environment: environment.unwrap_or_else(|| AZURE_CLOUD.to_string()),
        management_certificate: certificate,
    })
}

// =============================================================================
// Interceptor chains
// =============================================================================

/// Pending request half of an interaction, waiting for its `.reply(...)`.
struct PendingRequest {
    method: HttpMethod,
    url: String,
    body: Option<BodyMatcher>,
}

fn parse_scopes(source: &str) -> HarnessResult<Vec<InteractionGroup>> {
    let pattern = Regex::new(r#"\bnock\(\s*['"]"#)
        .map_err(|err| HarnessError::protocol("invalid nock pattern", err))?;
    let mut groups: Vec<(String, Vec<InteractionEntry>)> = Vec::new();
    for found in pattern.find_iter(source) {
        let (scheme, entries) = parse_chain(source, found.start())?;
        match groups.iter_mut().find(|(label, _)| *label == scheme) {
            Some((_, existing)) => existing.extend(entries),
            None => groups.push((scheme, entries)),
        }
    }
    Ok(groups
        .into_iter()
        .map(|(label, interactions)| InteractionGroup {
            label: Some(label),
            interactions,
        })
        .collect())
}

/// Parse `nock('base').a(...).b(...)...` starting at `start`.
fn parse_chain(source: &str, start: usize) -> HarnessResult<(String, Vec<InteractionEntry>)> {
    let mut scanner = Scanner::new(source, start);
    if scanner.ident() != Some("nock") {
        return Err(scanner.error("expected nock("));
    }
    scanner.expect(b'(')?;
    let base = scanner.string()?;
    scanner.expect(b')')?;
    let base = base.trim_end_matches('/').to_string();
    let scheme = base
        .split_once("://")
        .map_or_else(|| base.clone(), |(scheme, _)| scheme.to_ascii_lowercase());

    let mut entries = Vec::new();
    let mut filtered_body = false;
    let mut pending: Option<PendingRequest> = None;
    while scanner.eat(b'.') {
        let call = scanner
            .ident()
            .ok_or_else(|| scanner.error("expected method name after '.'"))?;
        match call {
            "filteringRequestBody" | "filteringPath" | "matchHeader" | "times" | "once"
            | "delay" | "delayConnection" | "persist" | "log" => {
                if call == "filteringRequestBody" {
                    filtered_body = true;
                }
                scanner.skip_balanced(b'(', b')')?;
            }
            "reply" => {
                let request = pending
                    .take()
                    .ok_or_else(|| scanner.error(".reply() without a preceding request"))?;
                let response = parse_reply(&mut scanner)?;
                entries.push(InteractionEntry {
                    request: RequestMatcher {
                        method: request.method,
                        url: request.url,
                        body: request.body,
                    },
                    response,
                });
            }
            verb => {
                let method: HttpMethod = verb
                    .parse()
                    .map_err(|_| scanner.error(format!("unsupported nock call .{verb}()")))?;
                pending = Some(parse_request(&mut scanner, method, &base, filtered_body)?);
            }
        }
    }
    if pending.is_some() {
        return Err(scanner.error("request without .reply()"));
    }
    Ok((scheme, entries))
}

fn parse_request(
    scanner: &mut Scanner<'_>,
    method: HttpMethod,
    base: &str,
    filtered_body: bool,
) -> HarnessResult<PendingRequest> {
    scanner.expect(b'(')?;
    let path = scanner.string()?;
    let body = if scanner.eat(b',') {
        Some(match scanner.value()? {
            JsValue::String(text) if filtered_body && text == "*" => BodyMatcher::Any,
            JsValue::String(text) => BodyMatcher::Exact { text },
            other => BodyMatcher::Json {
                value: other.to_json(),
            },
        })
    } else {
        None
    };
    scanner.expect(b')')?;
    Ok(PendingRequest {
        method,
        url: format!("{base}{path}"),
        body,
    })
}

fn parse_reply(scanner: &mut Scanner<'_>) -> HarnessResult<RecordedResponse> {
    scanner.expect(b'(')?;
    let status = match scanner.value()? {
        JsValue::Number(number) => number
            .as_u64()
            .and_then(|status| u16::try_from(status).ok())
            .ok_or_else(|| scanner.error("reply status is not a valid status code"))?,
        _ => return Err(scanner.error("reply status must be a number literal")),
    };
    let mut body = String::new();
    let mut headers = Headers::new();
    if scanner.eat(b',') {
        body = match scanner.value()? {
            JsValue::String(text) => text,
            JsValue::Null => String::new(),
            other => other.to_json().to_string(),
        };
        if scanner.eat(b',') {
            match scanner.value()? {
                JsValue::Object(entries) => {
                    for (name, value) in entries {
                        headers.append(name, value.to_text());
                    }
                }
                JsValue::Null => {}
                _ => return Err(scanner.error("reply headers must be an object literal")),
            }
        }
    }
    scanner.expect(b')')?;
    Ok(RecordedResponse {
        status,
        headers,
        body,
        delay_ms: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_name_strips_recording_suffix() {
        assert_eq!(
            scenario_name_from_file("arm_network_nsg_delete_should_delete_nsg.nock.js"),
            "arm_network_nsg_delete_should_delete_nsg"
        );
    }

    #[test]
    fn environment_assignments_are_collected() {
        let source = "exports.setEnvironment = function() {\n  process.env['AZURE_VM_TEST_LOCATION'] = 'eastus';\n  process.env[\"SSHCERT\"] = \"test/myCert.pem\";\n};";
        let environment = parse_environment(source).unwrap();
        assert_eq!(environment.get("AZURE_VM_TEST_LOCATION").map(String::as_str), Some("eastus"));
        assert_eq!(environment.get("SSHCERT").map(String::as_str), Some("test/myCert.pem"));
    }

    #[test]
    fn reply_without_headers_is_accepted() {
        let source = "nock('https://h:443').get('/a?x=1').reply(204)";
        let (scheme, entries) = parse_chain(source, 0).unwrap();
        assert_eq!(scheme, "https");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request.url, "https://h:443/a?x=1");
        assert_eq!(entries[0].response.status, 204);
        assert!(entries[0].response.body.is_empty());
    }

    #[test]
    fn object_body_becomes_json_matcher() {
        let source = "nock('http://h').post('/a', { b: 1 }).reply(200, { ok: true }, { 'x-a': 1 })";
        let (_, entries) = parse_chain(source, 0).unwrap();
        assert_eq!(
            entries[0].request.body,
            Some(BodyMatcher::Json {
                value: serde_json::json!({ "b": 1 })
            })
        );
        assert_eq!(entries[0].response.body, r#"{"ok":true}"#);
        assert_eq!(entries[0].response.headers.get("x-a"), Some("1"));
    }
}
