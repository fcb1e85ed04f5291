// Test module - relaxed lint rules
#![allow(clippy::default_trait_access)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::inefficient_to_string)]
#![allow(clippy::panic)]
#![allow(clippy::manual_assert)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::cast_possible_truncation)]
#![allow(missing_docs)]

//! Importer tests against the nock recordings shipped with the fixtures crate.

use std::fs;
use std::path::PathBuf;

use armtape::import::{import_nock, scenario_name_from_file};
use armtape::model::{BodyMatcher, HttpMethod};
use armtape::ErrorCode;

const NSG_RECORDING: &str = "arm_network_nsg_delete_should_delete_nsg.nock.js";
const VMSS_RECORDING: &str = "arm_compute_vmss_create-or-update-parameter_set_extension_should_pass.nock.js";
const VM_SHOW_RECORDING: &str = "arm_compute_vm_show_should_display_details_about_premium_VM.nock.js";

fn read_recording(file_name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../armtape-fixtures/recordings/nock")
        .join(file_name);
    fs::read_to_string(path).unwrap()
}

fn import(file_name: &str) -> armtape::ScenarioFixture {
    import_nock(&read_recording(file_name), &scenario_name_from_file(file_name)).unwrap()
}

#[test]
fn nsg_recording_groups_by_scheme() {
    let fixture = import(NSG_RECORDING);
    assert_eq!(fixture.name, "arm_network_nsg_delete_should_delete_nsg");

    let labels: Vec<Option<&str>> = fixture
        .groups
        .iter()
        .map(|group| group.label.as_deref())
        .collect();
    assert_eq!(labels, vec![Some("http"), Some("https")]);

    let methods: Vec<HttpMethod> = fixture.groups[1]
        .interactions
        .iter()
        .map(|entry| entry.request.method)
        .collect();
    assert_eq!(
        methods,
        vec![HttpMethod::Get, HttpMethod::Delete, HttpMethod::Get, HttpMethod::Get]
    );
    let statuses: Vec<u16> = fixture.groups[0]
        .interactions
        .iter()
        .map(|entry| entry.response.status)
        .collect();
    assert_eq!(statuses, vec![200, 202, 200, 404]);
    assert!(fixture.groups[0].interactions[0]
        .request
        .url
        .starts_with("http://management.azure.com:443/subscriptions/2c224e7e-3ef5-431d-a57b-e71f4662e3a6/"));
}

#[test]
fn nsg_recording_keeps_headers_and_bodies() {
    let fixture = import(NSG_RECORDING);
    let https = &fixture.groups[1];

    let first = &https.interactions[0].response;
    assert!(first.body.starts_with("{\r\n  \"name\": \"test-nsg\""));
    let nsg: serde_json::Value = serde_json::from_str(&first.body).unwrap();
    assert_eq!(nsg["etag"], "W/\"d11bfd55-7797-4955-83dd-206995604572\"");
    let header_names: Vec<&str> = first.headers.iter().map(|(name, _)| name).collect();
    assert_eq!(header_names[0], "cache-control");
    assert_eq!(header_names[1], "pragma");

    let delete = &https.interactions[1].response;
    assert!(delete.body.is_empty());
    assert_eq!(delete.headers.get("retry-after"), Some("10"));
    assert!(delete
        .headers
        .get("azure-asyncoperation")
        .unwrap()
        .contains("/operations/f3bfd85d-aee1-4750-8675-7edc742f3654"));
}

#[test]
fn nsg_recording_profile_and_environment() {
    let fixture = import(NSG_RECORDING);
    assert_eq!(
        fixture.environment.get("AZURE_VM_TEST_LOCATION").map(String::as_str),
        Some("eastus")
    );
    let subscription = fixture.profile.default_subscription().unwrap();
    assert_eq!(subscription.id, "2c224e7e-3ef5-431d-a57b-e71f4662e3a6");
    assert_eq!(subscription.name, "Node CLI Test");
    assert_eq!(subscription.user.user_type, "user");
    assert_eq!(subscription.environment, "AzureCloud");
    assert!(subscription.is_default);
    assert!(subscription.management_certificate.is_none());
}

#[test]
fn filtered_request_body_becomes_any_matcher() {
    let fixture = import(VMSS_RECORDING);
    let put = &fixture.groups[0].interactions[0];
    assert_eq!(put.request.method, HttpMethod::Put);
    assert_eq!(put.request.body, Some(BodyMatcher::Any));
    // Only the chain that declared the filter gets a body matcher.
    assert!(fixture.groups[0].interactions[1].request.body.is_none());

    let subscription = fixture.profile.default_subscription().unwrap();
    assert_eq!(subscription.user.user_type, "servicePrincipal");
    assert_eq!(
        subscription.management_certificate.as_ref().map(|cert| cert.key.as_str()),
        Some("mockedKey")
    );
    assert_eq!(
        fixture.environment.get("SSHCERT").map(String::as_str),
        Some("test/myCert.pem")
    );
}

#[test]
fn imported_fixture_matches_curated_recording_requests() {
    let imported = import(NSG_RECORDING);
    let curated = armtape::fixture::load_fixture_file(
        &PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../armtape-fixtures/recordings/nsg_delete.json"),
    )
    .unwrap();
    for (left, right) in imported.groups.iter().zip(&curated.groups) {
        let left: Vec<(HttpMethod, &str)> = left
            .interactions
            .iter()
            .map(|entry| (entry.request.method, entry.request.url.as_str()))
            .collect();
        let right: Vec<(HttpMethod, &str)> = right
            .interactions
            .iter()
            .map(|entry| (entry.request.method, entry.request.url.as_str()))
            .collect();
        assert_eq!(left, right);
    }
}

#[test]
fn vm_show_recording_imports_five_reads_per_scheme() {
    let fixture = import(VM_SHOW_RECORDING);
    assert_eq!(fixture.groups.len(), 2);
    for group in &fixture.groups {
        assert_eq!(group.interactions.len(), 5);
        assert!(group
            .interactions
            .iter()
            .all(|entry| entry.request.method == HttpMethod::Get
                && entry.request.url.ends_with("?api-version=2016-03-30")));
    }

    let curated = armtape::fixture::load_fixture_file(
        &PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../armtape-fixtures/recordings/vm_show.json"),
    )
    .unwrap();
    let urls = |fixture: &armtape::ScenarioFixture| -> Vec<String> {
        fixture
            .groups
            .iter()
            .flat_map(|group| group.interactions.iter())
            .map(|entry| entry.request.url.clone())
            .collect()
    };
    assert_eq!(urls(&fixture), urls(&curated));

    // The recorded VM names its availability set in upper case.
    let vm: serde_json::Value =
        serde_json::from_str(&fixture.groups[1].interactions[0].response.body).unwrap();
    assert!(vm["properties"]["availabilitySet"]["id"]
        .as_str()
        .unwrap()
        .ends_with("/XPLATTESTZVMAVAIL1176"));
}

#[test]
fn recording_without_interceptors_is_rejected() {
    let err = import_nock("exports.scopes = [];", "empty").unwrap_err();
    assert_eq!(err.code, ErrorCode::FixtureLoad);
}

#[test]
fn reply_without_request_is_rejected() {
    let source = "exports.scopes = [[function (nock) { var result = nock('https://h').reply(200); return result; }]];";
    let err = import_nock(source, "broken").unwrap_err();
    assert_eq!(err.code, ErrorCode::FixtureLoad);
    assert!(err.message.contains("reply"));
}

#[test]
fn unsupported_call_reports_line() {
    let source = "exports.scopes = [[function (nock) {\nvar result =\nnock('https://h')\n  .fetch('/a')\n  .reply(200);\n}]];";
    let err = import_nock(source, "broken").unwrap_err();
    assert_eq!(err.code, ErrorCode::FixtureLoad);
    assert!(err.message.contains(".fetch()"));
    assert_eq!(err.context.unwrap()["line"], 4);
}
