//! Minimal Azure Resource Manager client.
//!
//! Just enough of ARM to drive the network and compute commands: resource
//! URLs, JSON requests, error bodies and long-running operation polling. All
//! traffic goes through a [`Transport`], so the same code runs live or against
//! a replayed fixture.

pub mod compute;
pub mod network;

use crate::error::{ErrorCode, HarnessError, HarnessResult};
use crate::model::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// API version sent with every request.
pub const API_VERSION: &str = "2016-03-30";

/// Poll budget for a single long-running operation.
pub const DEFAULT_MAX_POLLS: u32 = 120;

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";
const LOCATION_HEADER: &str = "location";
const RETRY_AFTER_HEADER: &str = "retry-after";
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(10);

// =============================================================================
// Progress
// =============================================================================

/// Event emitted while a command talks to ARM.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A request is about to be sent.
    RequestStarted { method: HttpMethod, url: String },
    /// A long-running operation was polled and is not finished yet.
    OperationPending { attempt: u32, status: String },
    /// A long-running operation reached a terminal status.
    OperationFinished { status: OperationStatus },
}

/// Receives [`ProgressEvent`]s; the CLI uses it for step output.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Discards all events.
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

// =============================================================================
// Client
// =============================================================================

#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Fixed delay between operation polls; `None` honours `retry-after`.
    pub poll_interval: Option<Duration>,
    pub max_polls: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            poll_interval: None,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

pub struct ArmClient<'a> {
    transport: &'a dyn Transport,
    endpoint: Url,
    subscription_id: String,
    options: ClientOptions,
    progress: &'a dyn ProgressCallback,
}

impl<'a> ArmClient<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        endpoint: &str,
        subscription_id: impl Into<String>,
        options: ClientOptions,
    ) -> HarnessResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|err| {
            HarnessError::new(
                ErrorCode::CliInvalidArg,
                format!("invalid resource manager endpoint '{endpoint}'"),
                json!({ "source": err.to_string() }),
            )
        })?;
        Ok(Self {
            transport,
            endpoint,
            subscription_id: subscription_id.into(),
            options,
            progress: &NoopProgress,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Absolute URL for a resource path such as `/subscriptions/...`.
    pub fn resource_url(&self, path: &str) -> String {
        format!(
            "{}{}?api-version={API_VERSION}",
            self.endpoint_base(),
            path
        )
    }

    fn endpoint_base(&self) -> String {
        let mut base = format!(
            "{}://{}",
            self.endpoint.scheme(),
            self.endpoint.host_str().unwrap_or_default()
        );
        if let Some(port) = self.endpoint.port() {
            base.push(':');
            base.push_str(&port.to_string());
        }
        base.push_str(self.endpoint.path().trim_end_matches('/'));
        base
    }

    /// Point an absolute URL returned by ARM at the configured endpoint when
    /// it names the same host, keeping its path and query.
    fn rebase(&self, url: &str) -> String {
        match Url::parse(url) {
            Ok(parsed) if parsed.host_str() == self.endpoint.host_str() => {
                let mut rebased = format!("{}{}", self.endpoint_base(), parsed.path());
                if let Some(query) = parsed.query() {
                    rebased.push('?');
                    rebased.push_str(query);
                }
                rebased
            }
            _ => url.to_string(),
        }
    }

    fn send(&self, request: HttpRequest) -> HarnessResult<HttpResponse> {
        self.progress.on_progress(&ProgressEvent::RequestStarted {
            method: request.method,
            url: request.url.clone(),
        });
        let response = self.transport.send(&request)?;
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            "arm response"
        );
        Ok(response)
    }

    fn request(method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_header("accept", "application/json")
            .with_header(
                "user-agent",
                concat!("armtape/", env!("CARGO_PKG_VERSION")),
            )
    }

    pub fn get(&self, path: &str) -> HarnessResult<HttpResponse> {
        self.send(Self::request(HttpMethod::Get, self.resource_url(path)))
    }

    pub fn put_json(&self, path: &str, body: &str) -> HarnessResult<HttpResponse> {
        let request = Self::request(HttpMethod::Put, self.resource_url(path))
            .with_header("content-type", "application/json; charset=utf-8")
            .with_body(body);
        self.send(request)
    }

    pub fn delete(&self, path: &str) -> HarnessResult<HttpResponse> {
        self.send(Self::request(HttpMethod::Delete, self.resource_url(path)))
    }

    /// Poll the operation started by `initial` until it finishes.
    ///
    /// Returns `Succeeded` immediately when `initial` is not a long-running
    /// operation response.
    pub fn wait_for_operation(&self, initial: &HttpResponse) -> HarnessResult<OperationStatus> {
        if let Some(url) = initial.header(ASYNC_OPERATION_HEADER) {
            return self.poll_async_operation(&self.rebase(url), initial);
        }
        if is_accepted(initial) {
            if let Some(url) = initial.header(LOCATION_HEADER) {
                return self.poll_location(&self.rebase(url), initial);
            }
        }
        Ok(OperationStatus::Succeeded)
    }

    fn poll_async_operation(
        &self,
        url: &str,
        initial: &HttpResponse,
    ) -> HarnessResult<OperationStatus> {
        let mut previous = initial.clone();
        for attempt in 1..=self.options.max_polls {
            self.pause(&previous);
            let response = self.send(Self::request(HttpMethod::Get, url.to_string()))?;
            if !response.is_success() {
                return Err(api_error(&response));
            }
            let body: OperationBody = parse_json(&response.body)?;
            let status = OperationStatus::parse(&body.status);
            match status {
                OperationStatus::Succeeded => {
                    self.finish(&status);
                    return Ok(status);
                }
                OperationStatus::Failed | OperationStatus::Canceled => {
                    self.finish(&status);
                    return Err(operation_error(&status, body.error.as_ref()));
                }
                OperationStatus::InProgress | OperationStatus::Other(_) => {
                    self.progress.on_progress(&ProgressEvent::OperationPending {
                        attempt,
                        status: body.status.clone(),
                    });
                }
            }
            previous = response;
        }
        Err(self.poll_budget_exhausted(url))
    }

    fn poll_location(&self, url: &str, initial: &HttpResponse) -> HarnessResult<OperationStatus> {
        let mut previous = initial.clone();
        for attempt in 1..=self.options.max_polls {
            self.pause(&previous);
            let response = self.send(Self::request(HttpMethod::Get, url.to_string()))?;
            if response.status == 202 {
                self.progress.on_progress(&ProgressEvent::OperationPending {
                    attempt,
                    status: "Accepted".to_string(),
                });
                previous = response;
                continue;
            }
            if response.is_success() {
                let status = OperationStatus::Succeeded;
                self.finish(&status);
                return Ok(status);
            }
            return Err(api_error(&response));
        }
        Err(self.poll_budget_exhausted(url))
    }

    fn pause(&self, previous: &HttpResponse) {
        let delay = self.options.poll_interval.unwrap_or_else(|| {
            previous
                .header(RETRY_AFTER_HEADER)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs)
        });
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    fn finish(&self, status: &OperationStatus) {
        self.progress.on_progress(&ProgressEvent::OperationFinished {
            status: status.clone(),
        });
    }

    fn poll_budget_exhausted(&self, url: &str) -> HarnessError {
        HarnessError::new(
            ErrorCode::Timeout,
            format!(
                "operation did not finish after {} polls",
                self.options.max_polls
            ),
            json!({ "operation": url }),
        )
    }
}

fn is_accepted(response: &HttpResponse) -> bool {
    matches!(response.status, 201 | 202)
}

/// Whether `response` started an operation that must be polled.
pub fn is_long_running(response: &HttpResponse) -> bool {
    response.header(ASYNC_OPERATION_HEADER).is_some()
        || (is_accepted(response) && response.header(LOCATION_HEADER).is_some())
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
    Other(String),
}

impl OperationStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "InProgress" => Self::InProgress,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Canceled" => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "InProgress",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Other(value) => value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OperationBody {
    status: String,
    #[serde(default)]
    error: Option<ArmErrorDetail>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ArmErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: ArmErrorDetail,
}

/// ARM error detail from a failed response body, if it has one.
pub fn error_detail(response: &HttpResponse) -> Option<ArmErrorDetail> {
    serde_json::from_str::<ArmErrorBody>(&response.body)
        .ok()
        .map(|body| body.error)
}

/// `E_API` error for a non-success ARM response.
pub fn api_error(response: &HttpResponse) -> HarnessError {
    let detail = error_detail(response);
    let message = match &detail {
        Some(detail) if !detail.message.is_empty() => detail.message.clone(),
        _ => format!("request failed with status {}", response.status),
    };
    HarnessError::api(
        message,
        json!({
            "status": response.status,
            "code": detail.map(|detail| detail.code),
        }),
    )
}

fn operation_error(status: &OperationStatus, detail: Option<&ArmErrorDetail>) -> HarnessError {
    let message = detail
        .filter(|detail| !detail.message.is_empty())
        .map_or_else(
            || format!("operation finished with status {}", status.as_str()),
            |detail| detail.message.clone(),
        );
    HarnessError::api(
        message,
        json!({
            "status": status.as_str(),
            "code": detail.map(|detail| detail.code.clone()),
        }),
    )
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> HarnessResult<T> {
    serde_json::from_str(body).map_err(|err| HarnessError::protocol("malformed arm payload", err))
}

/// `/subscriptions/{sub}/resourceGroups/{group}/providers/{provider}/{kind}/{name}`
pub fn resource_path(
    subscription_id: &str,
    resource_group: &str,
    provider: &str,
    kind: &str,
    name: &str,
) -> String {
    format!(
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/{provider}/{kind}/{name}"
    )
}
