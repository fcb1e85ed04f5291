//! The seam through which HTTP requests leave the process.
//!
//! Commands talk to a `&dyn Transport`. In live mode that is a
//! [`NetworkTransport`]; under replay it is a [`ReplayTransport`] holding the
//! active [`ReplayCursor`], so the command never performs network I/O.

use crate::error::{HarnessError, HarnessResult};
use crate::interceptor::{intercept, ReplayCursor};
use crate::model::{Headers, HttpRequest, HttpResponse};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout for live traffic.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub trait Transport: Send + Sync {
    /// Issue `request` and return the response.
    ///
    /// Non-2xx statuses are responses, not errors.
    fn send(&self, request: &HttpRequest) -> HarnessResult<HttpResponse>;
}

/// Live HTTP(S) transport backed by a `ureq` agent.
#[derive(Debug)]
pub struct NetworkTransport {
    agent: ureq::Agent,
}

impl NetworkTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl Default for NetworkTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for NetworkTransport {
    fn send(&self, request: &HttpRequest) -> HarnessResult<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let mut outbound = self.agent.request(request.method.as_str(), &request.url);
        for (name, value) in request.headers.iter() {
            outbound = outbound.set(name, value);
        }
        let result = match request.body.as_deref() {
            Some(body) => outbound.send_string(body),
            None => outbound.call(),
        };
        let response = match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                return Err(HarnessError::transport(
                    format!("{} {} failed", request.method, request.url),
                    err,
                ))
            }
        };
        let status = response.status();
        let headers: Headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();
        let body = response
            .into_string()
            .map_err(|err| HarnessError::transport("failed to read response body", err))?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Transport answering every request from a replay cursor.
///
/// Concurrent callers are serialized on the cursor mutex, so requests are
/// matched in arrival order.
#[derive(Debug)]
pub struct ReplayTransport {
    cursor: Mutex<ReplayCursor>,
}

impl ReplayTransport {
    pub fn new(cursor: ReplayCursor) -> Self {
        Self {
            cursor: Mutex::new(cursor),
        }
    }

    /// Give the cursor back for deactivation.
    pub fn into_cursor(self) -> ReplayCursor {
        self.cursor
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for ReplayTransport {
    fn send(&self, request: &HttpRequest) -> HarnessResult<HttpResponse> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        intercept(&mut cursor, request)
    }
}
