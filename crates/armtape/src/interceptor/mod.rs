//! Process-wide HTTP interception against a recorded scenario.
//!
//! While a [`ReplayCursor`] exists the interceptor is considered active: every
//! outbound request the system under test makes is matched, in order, against
//! one interaction group of the fixture and answered with the recorded
//! response. No network I/O happens.
//!
//! # Key Types
//!
//! - [`ReplayCursor`] - Mutable position state for one replay run
//! - [`CursorState`] - Lifecycle of a cursor
//! - [`VerificationResult`] - Outcome reported by [`deactivate`]
//!
//! # Lifecycle
//!
//! ```no_run
//! use armtape::fixture::load_fixture_file;
//! use armtape::interceptor::{activate, deactivate, intercept};
//! use armtape::model::{HttpMethod, HttpRequest};
//! use std::path::Path;
//!
//! # fn example() -> armtape::error::HarnessResult<()> {
//! let fixture = load_fixture_file(Path::new("nsg_delete.json"))?;
//! let mut cursor = activate(fixture)?;
//! let request = HttpRequest::new(HttpMethod::Get, "https://management.azure.com/subscriptions");
//! let _response = intercept(&mut cursor, &request)?;
//! deactivate(cursor).into_result()?;
//! # Ok(())
//! # }
//! ```
//!
//! Only one cursor may exist per process. The activation flag is owned by a
//! lease stored inside the cursor, so dropping a cursor (early return, panic
//! unwinding, an aborted run) releases the interceptor just like
//! [`deactivate`] does.

use crate::error::{ErrorCode, HarnessError, HarnessResult};
use crate::model::{HttpRequest, HttpResponse, InteractionEntry, InteractionGroup, ScenarioFixture};
use crate::reporter::{
    report, DiagnosticDetails, DiagnosticKind, DiagnosticRecord, PendingEntry, RequestSummary,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

static INTERCEPTOR_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Whether a replay cursor currently holds the process-wide interceptor.
pub fn is_active() -> bool {
    INTERCEPTOR_ACTIVE.load(Ordering::Acquire)
}

/// Ownership of the process-wide interceptor flag.
#[derive(Debug)]
struct InterceptorLease(());

impl InterceptorLease {
    fn acquire(scenario: &str) -> HarnessResult<Self> {
        INTERCEPTOR_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                HarnessError::new(
                    ErrorCode::InterceptorAlreadyActive,
                    format!("cannot activate scenario '{scenario}': another replay is active"),
                    serde_json::json!({ "scenario": scenario }),
                )
            })?;
        Ok(Self(()))
    }
}

impl Drop for InterceptorLease {
    fn drop(&mut self) {
        INTERCEPTOR_ACTIVE.store(false, Ordering::Release);
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Lifecycle of a replay cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorState {
    /// No request seen yet; no group selected.
    Idle,
    /// A group is selected and has unconsumed entries.
    GroupSelected,
    /// Every entry of the selected group was consumed.
    Satisfied,
    /// A violation occurred; every later request is rejected.
    Failed,
}

/// Per-run replay position.
#[derive(Debug)]
pub struct ReplayCursor {
    fixture: ScenarioFixture,
    state: CursorState,
    group_index: Option<usize>,
    entry_index: usize,
    failures: Vec<DiagnosticRecord>,
    _lease: InterceptorLease,
}

impl ReplayCursor {
    pub fn fixture(&self) -> &ScenarioFixture {
        &self.fixture
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Index of the selected alternative, once the first request arrived.
    pub fn group_index(&self) -> Option<usize> {
        self.group_index
    }

    /// Number of consumed entries in the selected group.
    pub fn entry_index(&self) -> usize {
        self.entry_index
    }

    pub fn failures(&self) -> &[DiagnosticRecord] {
        &self.failures
    }

    fn selected_group(&self) -> Option<&InteractionGroup> {
        self.fixture.groups.get(self.group_index?)
    }

    fn scenario(&self) -> String {
        self.fixture.name.clone()
    }

    fn fail(&mut self, record: DiagnosticRecord) -> HarnessError {
        let err = record.to_error();
        self.failures.push(record);
        self.state = CursorState::Failed;
        err
    }
}

/// Claim the process-wide interceptor and start a replay run for `fixture`.
pub fn activate(fixture: ScenarioFixture) -> HarnessResult<ReplayCursor> {
    let lease = InterceptorLease::acquire(&fixture.name)?;
    info!(
        scenario = %fixture.name,
        groups = fixture.groups.len(),
        interactions = fixture.interaction_count(),
        "replay interceptor activated"
    );
    Ok(ReplayCursor {
        fixture,
        state: CursorState::Idle,
        group_index: None,
        entry_index: 0,
        failures: Vec::new(),
        _lease: lease,
    })
}

// =============================================================================
// Matching
// =============================================================================

/// Answer `request` from the next recorded entry.
///
/// Errors are synthetic transport failures from the caller's point of view;
/// the cursor keeps the diagnostic for [`deactivate`].
pub fn intercept(cursor: &mut ReplayCursor, request: &HttpRequest) -> HarnessResult<HttpResponse> {
    match cursor.state {
        CursorState::Failed => Err(rejection(cursor)),
        CursorState::Satisfied => Err(exhausted(cursor, request)),
        CursorState::Idle => {
            let group_index = select_group(&cursor.fixture.groups, request);
            match group_index {
                Some(index) => {
                    debug!(scenario = %cursor.fixture.name, group = index, "selected interaction group");
                    cursor.group_index = Some(index);
                    cursor.state = CursorState::GroupSelected;
                    consume_next(cursor, request)
                }
                None => {
                    let record = unexpected(cursor, request, 0, 0, None);
                    Err(cursor.fail(record))
                }
            }
        }
        CursorState::GroupSelected => consume_next(cursor, request),
    }
}

/// First-structural-match selection, preferring a candidate whose first
/// entry already matches exactly.
fn select_group(groups: &[InteractionGroup], request: &HttpRequest) -> Option<usize> {
    let actual_path = parse_url(&request.url).map(|url| url.path().to_string());
    let candidates: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, group)| {
            group.interactions.first().is_some_and(|entry| {
                entry.request.method == request.method
                    && parse_url(&entry.request.url).map(|url| url.path().to_string())
                        == actual_path
            })
        })
        .map(|(index, _)| index)
        .collect();
    candidates
        .iter()
        .copied()
        .find(|index| {
            groups
                .get(*index)
                .and_then(|group| group.interactions.first())
                .is_some_and(|entry| mismatch_reason(entry, request).is_none())
        })
        .or_else(|| candidates.first().copied())
}

fn consume_next(cursor: &mut ReplayCursor, request: &HttpRequest) -> HarnessResult<HttpResponse> {
    let position = cursor.entry_index;
    let Some(entry) = cursor
        .selected_group()
        .and_then(|group| group.interactions.get(position))
        .cloned()
    else {
        return Err(exhausted(cursor, request));
    };

    if let Some(reason) = mismatch_reason(&entry, request) {
        let group_index = cursor.group_index.unwrap_or_default();
        let record = unexpected(cursor, request, group_index, position, Some(reason));
        return Err(cursor.fail(record));
    }

    debug!(
        scenario = %cursor.fixture.name,
        group = ?cursor.group_index,
        entry = position,
        method = %request.method,
        url = %request.url,
        status = entry.response.status,
        "replayed recorded interaction"
    );
    cursor.entry_index += 1;
    let group_len = cursor
        .selected_group()
        .map_or(0, |group| group.interactions.len());
    if cursor.entry_index >= group_len {
        cursor.state = CursorState::Satisfied;
    }

    if let Some(delay) = entry.response.delay_ms {
        std::thread::sleep(Duration::from_millis(delay));
    }
    Ok(HttpResponse {
        status: entry.response.status,
        headers: entry.response.headers,
        body: entry.response.body,
    })
}

/// Why `request` does not consume `entry`, or `None` on an exact match.
fn mismatch_reason(entry: &InteractionEntry, request: &HttpRequest) -> Option<String> {
    if entry.request.method != request.method {
        return Some("method differs".to_string());
    }
    match (parse_url(&entry.request.url), parse_url(&request.url)) {
        (Some(expected), Some(actual)) if expected == actual => {}
        (_, None) => return Some("request url is not absolute".to_string()),
        _ => return Some("url differs".to_string()),
    }
    match &entry.request.body {
        Some(matcher) if !matcher.matches(request.body.as_deref()) => {
            Some("body differs".to_string())
        }
        _ => None,
    }
}

/// Normalized URL: lower-cased scheme and host, default ports elided, query
/// kept verbatim so parameter order still matters.
fn parse_url(raw: &str) -> Option<Url> {
    Url::parse(raw).ok()
}

// =============================================================================
// Diagnostics
// =============================================================================

fn unexpected(
    cursor: &ReplayCursor,
    request: &HttpRequest,
    group_index: usize,
    position: usize,
    reason: Option<String>,
) -> DiagnosticRecord {
    let expected = cursor
        .fixture
        .groups
        .get(group_index)
        .and_then(|group| group.interactions.get(position))
        .map(RequestSummary::from_entry);
    report(
        DiagnosticKind::UnexpectedRequest,
        DiagnosticDetails {
            scenario: cursor.scenario(),
            group_index: Some(group_index),
            entry_index: Some(position),
            expected,
            actual: Some(RequestSummary::from_request(request)),
            reason,
            unconsumed: Vec::new(),
        },
    )
}

fn exhausted(cursor: &mut ReplayCursor, request: &HttpRequest) -> HarnessError {
    let record = report(
        DiagnosticKind::ExhaustedScenario,
        DiagnosticDetails {
            scenario: cursor.scenario(),
            group_index: cursor.group_index,
            entry_index: Some(cursor.entry_index),
            actual: Some(RequestSummary::from_request(request)),
            ..DiagnosticDetails::default()
        },
    );
    cursor.fail(record)
}

/// Repeat the first failure for requests arriving after the run failed.
fn rejection(cursor: &ReplayCursor) -> HarnessError {
    cursor.failures.first().map_or_else(
        || HarnessError::new(ErrorCode::UnexpectedRequest, "replay already failed", None),
        DiagnosticRecord::to_error,
    )
}

// =============================================================================
// Verification
// =============================================================================

/// Outcome of a replay run.
#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    pub scenario: String,
    pub state: CursorState,
    pub group_index: Option<usize>,
    pub consumed: usize,
    pub unconsumed: Vec<PendingEntry>,
    /// Violations recorded while intercepting, in order.
    pub failures: Vec<DiagnosticRecord>,
    /// Set when entries were left unconsumed.
    pub incomplete: Option<DiagnosticRecord>,
}

impl VerificationResult {
    pub fn is_satisfied(&self) -> bool {
        self.failures.is_empty() && self.incomplete.is_none()
    }

    /// First recorded failure, else the incomplete-scenario error.
    pub fn into_result(self) -> HarnessResult<()> {
        if let Some(record) = self.failures.first() {
            return Err(record.to_error());
        }
        match self.incomplete {
            Some(record) => Err(record.to_error()),
            None => Ok(()),
        }
    }
}

/// Release the interceptor and verify that the run consumed its group.
///
/// Always succeeds in releasing; verification problems are reported in the
/// returned [`VerificationResult`].
pub fn deactivate(cursor: ReplayCursor) -> VerificationResult {
    let reported_group = cursor.group_index.unwrap_or(0);
    let consumed = if cursor.group_index.is_some() {
        cursor.entry_index
    } else {
        0
    };
    let unconsumed: Vec<PendingEntry> = cursor
        .fixture
        .groups
        .get(reported_group)
        .map(|group| {
            group
                .interactions
                .iter()
                .enumerate()
                .skip(consumed)
                .map(|(entry_index, entry)| PendingEntry {
                    entry_index,
                    request: RequestSummary::from_entry(entry),
                })
                .collect()
        })
        .unwrap_or_default();

    let incomplete = (!unconsumed.is_empty()).then(|| {
        report(
            DiagnosticKind::IncompleteScenario,
            DiagnosticDetails {
                scenario: cursor.scenario(),
                group_index: Some(reported_group),
                unconsumed: unconsumed.clone(),
                ..DiagnosticDetails::default()
            },
        )
    });

    info!(
        scenario = %cursor.fixture.name,
        state = ?cursor.state,
        consumed,
        unconsumed = unconsumed.len(),
        failures = cursor.failures.len(),
        "replay interceptor deactivated"
    );

    let ReplayCursor {
        fixture,
        state,
        group_index,
        failures,
        _lease: lease,
        ..
    } = cursor;
    drop(lease);

    VerificationResult {
        scenario: fixture.name,
        state,
        group_index,
        consumed,
        unconsumed,
        failures,
        incomplete,
    }
}
