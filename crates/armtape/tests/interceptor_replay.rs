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

//! Replay interceptor tests: group selection, strict ordering, exhaustion,
//! incompleteness and the single-activation guard.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use armtape::interceptor::{activate, deactivate, intercept, is_active, CursorState};
use armtape::model::{
    BodyMatcher, Headers, HttpMethod, HttpRequest, InteractionEntry, InteractionGroup, Profile,
    RecordedResponse, RequestMatcher, ScenarioFixture, FIXTURE_VERSION,
};
use armtape::reporter::DiagnosticKind;
use armtape::transport::{ReplayTransport, Transport};
use armtape::ErrorCode;
use serial_test::serial;

const A: &str = "https://management.azure.com/subscriptions/s/a?api-version=2016-03-30";
const B: &str = "https://management.azure.com/subscriptions/s/b?api-version=2016-03-30";
const C: &str = "https://management.azure.com/subscriptions/s/c?api-version=2016-03-30";

fn entry(method: HttpMethod, url: &str, status: u16, body: &str) -> InteractionEntry {
    InteractionEntry {
        request: RequestMatcher {
            method,
            url: url.to_string(),
            body: None,
        },
        response: RecordedResponse {
            status,
            headers: [("content-type", "application/json")].into_iter().collect(),
            body: body.to_string(),
            delay_ms: None,
        },
    }
}

fn fixture(groups: Vec<Vec<InteractionEntry>>) -> ScenarioFixture {
    ScenarioFixture {
        fixture_version: FIXTURE_VERSION,
        name: "replay-test".to_string(),
        description: None,
        profile: Profile::default(),
        environment: Default::default(),
        groups: groups
            .into_iter()
            .map(|interactions| InteractionGroup {
                label: None,
                interactions,
            })
            .collect(),
    }
}

fn three_step() -> ScenarioFixture {
    fixture(vec![vec![
        entry(HttpMethod::Get, A, 200, "{\"step\":1}"),
        entry(HttpMethod::Get, B, 200, "{\"step\":2}"),
        entry(HttpMethod::Get, C, 404, ""),
    ]])
}

fn get(url: &str) -> HttpRequest {
    HttpRequest::new(HttpMethod::Get, url)
}

#[test]
#[serial]
fn replays_each_entry_in_order() {
    let mut cursor = activate(three_step()).unwrap();
    assert!(is_active());
    assert_eq!(cursor.state(), CursorState::Idle);

    let first = intercept(&mut cursor, &get(A)).unwrap();
    assert_eq!(first.status, 200);
    assert_eq!(first.body, "{\"step\":1}");
    assert_eq!(first.header("Content-Type"), Some("application/json"));
    assert_eq!(cursor.state(), CursorState::GroupSelected);
    assert_eq!(cursor.group_index(), Some(0));

    assert_eq!(intercept(&mut cursor, &get(B)).unwrap().body, "{\"step\":2}");
    assert_eq!(intercept(&mut cursor, &get(C)).unwrap().status, 404);
    assert_eq!(cursor.state(), CursorState::Satisfied);

    let verification = deactivate(cursor);
    assert!(verification.is_satisfied());
    assert_eq!(verification.consumed, 3);
    assert!(!is_active());
    verification.into_result().unwrap();
}

#[test]
#[serial]
fn out_of_order_request_is_unexpected_at_divergence() {
    let mut cursor = activate(three_step()).unwrap();
    intercept(&mut cursor, &get(A)).unwrap();

    let err = intercept(&mut cursor, &get(C)).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnexpectedRequest);
    assert_eq!(err.exit_code(), 3);
    assert!(err.message.contains(&format!("expected GET {B}")), "{}", err.message);
    assert!(err.message.contains(&format!("got GET {C}")), "{}", err.message);
    let context = err.context.unwrap();
    assert_eq!(context["entry_index"], 1);
    assert_eq!(context["group_index"], 0);
    assert_eq!(cursor.state(), CursorState::Failed);

    // Later requests keep failing with the first diagnostic.
    let again = intercept(&mut cursor, &get(B)).unwrap_err();
    assert_eq!(again.message, err.message);

    let verification = deactivate(cursor);
    assert!(!verification.is_satisfied());
    assert_eq!(verification.failures.len(), 1);
    assert_eq!(verification.failures[0].kind, DiagnosticKind::UnexpectedRequest);
    assert_eq!(
        verification.into_result().unwrap_err().code,
        ErrorCode::UnexpectedRequest
    );
}

#[test]
#[serial]
fn first_request_matching_no_group_is_unexpected() {
    let mut cursor = activate(three_step()).unwrap();
    let err = intercept(&mut cursor, &HttpRequest::new(HttpMethod::Delete, A)).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnexpectedRequest);
    assert!(err.message.contains(&format!("got DELETE {A}")));
    assert_eq!(cursor.state(), CursorState::Failed);
    deactivate(cursor);
}

#[test]
#[serial]
fn extra_request_after_last_entry_is_exhausted() {
    let mut cursor = activate(fixture(vec![vec![entry(HttpMethod::Get, A, 200, "")]])).unwrap();
    intercept(&mut cursor, &get(A)).unwrap();

    let err = intercept(&mut cursor, &get(A)).unwrap_err();
    assert_eq!(err.code, ErrorCode::ExhaustedScenario);
    assert_eq!(err.exit_code(), 4);
    assert!(err.message.contains("exhausted"));

    let verification = deactivate(cursor);
    assert_eq!(verification.state, CursorState::Failed);
    assert_eq!(
        verification.into_result().unwrap_err().code,
        ErrorCode::ExhaustedScenario
    );
}

#[test]
#[serial]
fn leftover_entries_are_listed_as_incomplete() {
    let mut cursor = activate(three_step()).unwrap();
    intercept(&mut cursor, &get(A)).unwrap();

    let verification = deactivate(cursor);
    assert!(verification.failures.is_empty());
    assert_eq!(verification.consumed, 1);
    let pending: Vec<usize> = verification
        .unconsumed
        .iter()
        .map(|entry| entry.entry_index)
        .collect();
    assert_eq!(pending, vec![1, 2]);

    let err = verification.into_result().unwrap_err();
    assert_eq!(err.code, ErrorCode::IncompleteScenario);
    assert_eq!(err.exit_code(), 5);
    assert!(err.message.contains("2 recorded interaction(s)"), "{}", err.message);
    assert!(err.message.contains(&format!("[1] GET {B}")), "{}", err.message);
    assert!(err.message.contains(&format!("[2] GET {C}")), "{}", err.message);
}

#[test]
#[serial]
fn run_without_requests_reports_whole_first_group() {
    let cursor = activate(three_step()).unwrap();
    let verification = deactivate(cursor);
    assert_eq!(verification.group_index, None);
    assert_eq!(verification.unconsumed.len(), 3);
    assert_eq!(
        verification.into_result().unwrap_err().code,
        ErrorCode::IncompleteScenario
    );
}

#[test]
#[serial]
fn second_activation_is_rejected_until_release() {
    let cursor = activate(three_step()).unwrap();
    let err = activate(three_step()).unwrap_err();
    assert_eq!(err.code, ErrorCode::InterceptorAlreadyActive);
    assert_eq!(err.exit_code(), 6);

    deactivate(cursor);
    let cursor = activate(three_step()).unwrap();
    drop(cursor);
    assert!(!is_active());
}

#[test]
#[serial]
fn dropped_cursor_releases_the_interceptor() {
    {
        let mut cursor = activate(three_step()).unwrap();
        intercept(&mut cursor, &get(A)).unwrap();
    }
    assert!(!is_active());
    deactivate(activate(three_step()).unwrap());
}

#[test]
#[serial]
fn alternative_group_is_selected_by_first_request() {
    let http_a = "http://management.azure.com:443/subscriptions/s/a?api-version=2016-03-30";
    let http_b = "http://management.azure.com:443/subscriptions/s/b?api-version=2016-03-30";
    let recorded = fixture(vec![
        vec![
            entry(HttpMethod::Get, http_a, 200, "http"),
            entry(HttpMethod::Get, http_b, 200, "http"),
        ],
        vec![
            entry(HttpMethod::Get, A, 200, "https"),
            entry(HttpMethod::Get, B, 200, "https"),
        ],
    ]);

    let mut cursor = activate(recorded.clone()).unwrap();
    assert_eq!(intercept(&mut cursor, &get(A)).unwrap().body, "https");
    assert_eq!(cursor.group_index(), Some(1));
    assert_eq!(intercept(&mut cursor, &get(B)).unwrap().body, "https");
    deactivate(cursor).into_result().unwrap();

    let mut cursor = activate(recorded).unwrap();
    assert_eq!(intercept(&mut cursor, &get(http_a)).unwrap().body, "http");
    assert_eq!(cursor.group_index(), Some(0));
    assert_eq!(intercept(&mut cursor, &get(http_b)).unwrap().body, "http");
    deactivate(cursor).into_result().unwrap();
}

#[test]
#[serial]
fn explicit_default_port_matches_elided_port() {
    let recorded = "https://management.azure.com:443/subscriptions/s/a?api-version=2016-03-30";
    let mut cursor = activate(fixture(vec![vec![entry(HttpMethod::Get, recorded, 200, "")]]))
        .unwrap();
    intercept(&mut cursor, &get(A)).unwrap();
    deactivate(cursor).into_result().unwrap();
}

#[test]
#[serial]
fn query_order_is_significant() {
    let recorded = "https://management.azure.com/x?a=1&b=2";
    let mut cursor = activate(fixture(vec![vec![entry(HttpMethod::Get, recorded, 200, "")]]))
        .unwrap();
    let err = intercept(&mut cursor, &get("https://management.azure.com/x?b=2&a=1")).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnexpectedRequest);
    assert!(err.message.contains("url differs"));
    deactivate(cursor);
}

#[test]
#[serial]
fn body_matchers_are_enforced() {
    let mut exact = entry(HttpMethod::Put, A, 201, "");
    exact.request.body = Some(BodyMatcher::Exact {
        text: "payload".to_string(),
    });
    let mut json = entry(HttpMethod::Put, B, 200, "");
    json.request.body = Some(BodyMatcher::Json {
        value: serde_json::json!({ "sku": { "capacity": 10 } }),
    });
    let mut any = entry(HttpMethod::Put, C, 200, "");
    any.request.body = Some(BodyMatcher::Any);

    let mut cursor = activate(fixture(vec![vec![exact, json, any]])).unwrap();
    intercept(
        &mut cursor,
        &HttpRequest::new(HttpMethod::Put, A).with_body("payload"),
    )
    .unwrap();
    intercept(
        &mut cursor,
        &HttpRequest::new(HttpMethod::Put, B).with_body("{ \"sku\": {\"capacity\": 10} }"),
    )
    .unwrap();
    intercept(&mut cursor, &HttpRequest::new(HttpMethod::Put, C)).unwrap();
    deactivate(cursor).into_result().unwrap();

    let mut exact = entry(HttpMethod::Put, A, 201, "");
    exact.request.body = Some(BodyMatcher::Exact {
        text: "payload".to_string(),
    });
    let mut cursor = activate(fixture(vec![vec![exact]])).unwrap();
    let err = intercept(
        &mut cursor,
        &HttpRequest::new(HttpMethod::Put, A).with_body("other"),
    )
    .unwrap_err();
    assert!(err.message.contains("body differs"));
    deactivate(cursor);
}

#[test]
#[serial]
fn recorded_delay_is_applied() {
    let mut slow = entry(HttpMethod::Get, A, 200, "");
    slow.response.delay_ms = Some(50);
    let mut cursor = activate(fixture(vec![vec![slow]])).unwrap();
    let started = Instant::now();
    intercept(&mut cursor, &get(A)).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(50));
    deactivate(cursor).into_result().unwrap();
}

#[test]
#[serial]
fn replay_transport_serializes_concurrent_callers() {
    let entries: Vec<InteractionEntry> = (0..8)
        .map(|index| {
            entry(
                HttpMethod::Get,
                "https://management.azure.com/poll",
                200,
                &index.to_string(),
            )
        })
        .collect();
    let transport = Arc::new(ReplayTransport::new(
        activate(fixture(vec![entries])).unwrap(),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                transport
                    .send(&get("https://management.azure.com/poll"))
                    .unwrap()
                    .body
            })
        })
        .collect();
    let mut bodies: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    bodies.sort();
    let expected: Vec<String> = (0..8).map(|index: i32| index.to_string()).collect();
    assert_eq!(bodies, expected);

    let transport = Arc::try_unwrap(transport).unwrap();
    deactivate(transport.into_cursor()).into_result().unwrap();
}

#[test]
#[serial]
fn response_headers_keep_recorded_order() {
    let mut recorded = entry(HttpMethod::Get, A, 200, "");
    recorded.response.headers = [("z-last", "1"), ("a-first", "2"), ("Location", "x")]
        .into_iter()
        .collect::<Headers>();
    let mut cursor = activate(fixture(vec![vec![recorded]])).unwrap();
    let response = intercept(&mut cursor, &get(A)).unwrap();
    let names: Vec<&str> = response.headers.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["z-last", "a-first", "Location"]);
    deactivate(cursor).into_result().unwrap();
}
