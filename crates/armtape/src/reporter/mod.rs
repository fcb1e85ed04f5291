//! Mismatch and exhaustion reporting.
//!
//! The reporter turns replay violations into [`DiagnosticRecord`]s: a
//! structured record plus human-readable text. It never touches cursor state;
//! the interceptor decides when to report and what to do afterwards.

use crate::error::{ErrorCode, HarnessError};
use crate::model::{HttpMethod, HttpRequest, InteractionEntry};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::warn;

/// Kind of replay violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnexpectedRequest,
    ExhaustedScenario,
    IncompleteScenario,
}

impl DiagnosticKind {
    pub fn error_code(self) -> ErrorCode {
        match self {
            DiagnosticKind::UnexpectedRequest => ErrorCode::UnexpectedRequest,
            DiagnosticKind::ExhaustedScenario => ErrorCode::ExhaustedScenario,
            DiagnosticKind::IncompleteScenario => ErrorCode::IncompleteScenario,
        }
    }
}

/// Method and URL of a request, recorded or actual.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub method: HttpMethod,
    pub url: String,
}

impl RequestSummary {
    pub fn from_request(request: &HttpRequest) -> Self {
        Self {
            method: request.method,
            url: request.url.clone(),
        }
    }

    pub fn from_entry(entry: &InteractionEntry) -> Self {
        Self {
            method: entry.request.method,
            url: entry.request.url.clone(),
        }
    }
}

impl std::fmt::Display for RequestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An unconsumed entry together with its position in the group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub entry_index: usize,
    #[serde(flatten)]
    pub request: RequestSummary,
}

/// Inputs to [`report`].
#[derive(Clone, Debug, Default)]
pub struct DiagnosticDetails {
    pub scenario: String,
    pub group_index: Option<usize>,
    pub entry_index: Option<usize>,
    pub expected: Option<RequestSummary>,
    pub actual: Option<RequestSummary>,
    /// Extra explanation appended to the message (e.g. body mismatch).
    pub reason: Option<String>,
    pub unconsumed: Vec<PendingEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub kind: DiagnosticKind,
    pub scenario: String,
    pub group_index: Option<usize>,
    pub entry_index: Option<usize>,
    pub expected: Option<RequestSummary>,
    pub actual: Option<RequestSummary>,
    pub unconsumed: Vec<PendingEntry>,
    pub message: String,
}

impl DiagnosticRecord {
    pub fn to_error(&self) -> HarnessError {
        HarnessError::new(
            self.kind.error_code(),
            self.message.clone(),
            serde_json::to_value(self).ok(),
        )
    }
}

/// Format a violation into a diagnostic record and log it.
pub fn report(kind: DiagnosticKind, details: DiagnosticDetails) -> DiagnosticRecord {
    let message = format_message(kind, &details);
    warn!(
        kind = ?kind,
        scenario = %details.scenario,
        group = ?details.group_index,
        entry = ?details.entry_index,
        "{message}"
    );
    DiagnosticRecord {
        kind,
        scenario: details.scenario,
        group_index: details.group_index,
        entry_index: details.entry_index,
        expected: details.expected,
        actual: details.actual,
        unconsumed: details.unconsumed,
        message,
    }
}

fn format_message(kind: DiagnosticKind, details: &DiagnosticDetails) -> String {
    let mut message = match kind {
        DiagnosticKind::UnexpectedRequest => format_unexpected(details),
        DiagnosticKind::ExhaustedScenario => format_exhausted(details),
        DiagnosticKind::IncompleteScenario => format_incomplete(details),
    };
    if let Some(reason) = details.reason.as_deref() {
        let _ = write!(message, " ({reason})");
    }
    message
}

fn position(details: &DiagnosticDetails) -> String {
    match (details.group_index, details.entry_index) {
        (Some(group), Some(entry)) => format!("group {group}, entry {entry}"),
        (Some(group), None) => format!("group {group}"),
        _ => "no group selected".to_string(),
    }
}

fn describe(summary: Option<&RequestSummary>) -> String {
    summary.map_or_else(|| "<none>".to_string(), ToString::to_string)
}

fn format_unexpected(details: &DiagnosticDetails) -> String {
    format!(
        "unexpected request in scenario '{}': expected {} ({}), got {}",
        details.scenario,
        describe(details.expected.as_ref()),
        position(details),
        describe(details.actual.as_ref()),
    )
}

fn format_exhausted(details: &DiagnosticDetails) -> String {
    let consumed = details.entry_index.unwrap_or_default();
    format!(
        "scenario '{}' exhausted: all {consumed} recorded interactions of {} were consumed, got {}",
        details.scenario,
        position(&DiagnosticDetails {
            entry_index: None,
            ..details.clone()
        }),
        describe(details.actual.as_ref()),
    )
}

fn format_incomplete(details: &DiagnosticDetails) -> String {
    let mut message = format!(
        "scenario '{}' incomplete: {} recorded interaction(s) of {} were never requested:",
        details.scenario,
        details.unconsumed.len(),
        position(&DiagnosticDetails {
            entry_index: None,
            ..details.clone()
        }),
    );
    for pending in &details.unconsumed {
        let _ = write!(message, "\n  [{}] {}", pending.entry_index, pending.request);
    }
    message
}
