//! Error codes and the harness-wide error type.
//!
//! Every fallible operation in the crate returns [`HarnessResult`]. Errors
//! carry a stable [`ErrorCode`] (also used to derive the CLI exit status), a
//! human-readable message, and optional structured JSON context.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Stable error codes surfaced to callers and mapped to exit statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "E_CLI_INVALID_ARG")]
    CliInvalidArg,
    #[serde(rename = "E_API")]
    Api,
    #[serde(rename = "E_FIXTURE_LOAD")]
    FixtureLoad,
    #[serde(rename = "E_UNEXPECTED_REQUEST")]
    UnexpectedRequest,
    #[serde(rename = "E_EXHAUSTED_SCENARIO")]
    ExhaustedScenario,
    #[serde(rename = "E_INCOMPLETE_SCENARIO")]
    IncompleteScenario,
    #[serde(rename = "E_INTERCEPTOR_ACTIVE")]
    InterceptorAlreadyActive,
    #[serde(rename = "E_TRANSPORT")]
    Transport,
    #[serde(rename = "E_TIMEOUT")]
    Timeout,
    #[serde(rename = "E_IO")]
    Io,
    #[serde(rename = "E_PROTOCOL")]
    Protocol,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 11] = [
        ErrorCode::CliInvalidArg,
        ErrorCode::Api,
        ErrorCode::FixtureLoad,
        ErrorCode::UnexpectedRequest,
        ErrorCode::ExhaustedScenario,
        ErrorCode::IncompleteScenario,
        ErrorCode::InterceptorAlreadyActive,
        ErrorCode::Transport,
        ErrorCode::Timeout,
        ErrorCode::Io,
        ErrorCode::Protocol,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::CliInvalidArg => "E_CLI_INVALID_ARG",
            ErrorCode::Api => "E_API",
            ErrorCode::FixtureLoad => "E_FIXTURE_LOAD",
            ErrorCode::UnexpectedRequest => "E_UNEXPECTED_REQUEST",
            ErrorCode::ExhaustedScenario => "E_EXHAUSTED_SCENARIO",
            ErrorCode::IncompleteScenario => "E_INCOMPLETE_SCENARIO",
            ErrorCode::InterceptorAlreadyActive => "E_INTERCEPTOR_ACTIVE",
            ErrorCode::Transport => "E_TRANSPORT",
            ErrorCode::Timeout => "E_TIMEOUT",
            ErrorCode::Io => "E_IO",
            ErrorCode::Protocol => "E_PROTOCOL",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == code)
    }

    /// Process exit status for a command that failed with this code.
    ///
    /// Domain validation failures (bad flags, ARM error responses) exit with
    /// 1 so callers can treat them like any other failed command; replay
    /// violations get distinct statuses so harnesses can tell them apart.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCode::CliInvalidArg | ErrorCode::Api => 1,
            ErrorCode::FixtureLoad => 2,
            ErrorCode::UnexpectedRequest => 3,
            ErrorCode::ExhaustedScenario => 4,
            ErrorCode::IncompleteScenario => 5,
            ErrorCode::InterceptorAlreadyActive => 6,
            ErrorCode::Transport => 7,
            ErrorCode::Timeout => 8,
            ErrorCode::Io => 9,
            ErrorCode::Protocol => 10,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::CliInvalidArg => "invalid command-line arguments or command input",
            ErrorCode::Api => "the remote API returned an error or an unexpected resource state",
            ErrorCode::FixtureLoad => "fixture file is malformed or inconsistent",
            ErrorCode::UnexpectedRequest => "request did not match the next recorded interaction",
            ErrorCode::ExhaustedScenario => "request issued after all recorded interactions",
            ErrorCode::IncompleteScenario => "recorded interactions were left unconsumed",
            ErrorCode::InterceptorAlreadyActive => "a replay interceptor is already active",
            ErrorCode::Transport => "network transport failure",
            ErrorCode::Timeout => "long-running operation did not finish within budget",
            ErrorCode::Io => "file-system failure",
            ErrorCode::Protocol => "malformed payload",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error information suitable for JSON output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub context: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct HarnessError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<Value>,
}

impl HarnessError {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        context: impl Into<Option<Value>>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn io(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::with_source(ErrorCode::Io, message, err)
    }

    pub fn protocol(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::with_source(ErrorCode::Protocol, message, err)
    }

    pub fn fixture_load(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::FixtureLoad, message, context)
    }

    pub fn transport(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::with_source(ErrorCode::Transport, message, err)
    }

    pub fn api(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Api, message, context)
    }

    pub fn cli_invalid_arg(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CliInvalidArg, message, None)
    }

    fn with_source(code: ErrorCode, message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self {
            code,
            message: message.into(),
            context: Some(serde_json::json!({ "source": err.to_string() })),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code.as_str().to_string(),
            message: self.message.clone(),
            context: self.context.clone(),
        }
    }
}

impl Diagnostic for HarnessError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code))
    }
}
