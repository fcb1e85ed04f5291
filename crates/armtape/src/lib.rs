//! armtape: deterministic HTTP replay for command-line tools that talk to
//! Azure Resource Manager.
//!
//! A scenario fixture holds one or more alternative interaction groups, each
//! an ordered list of recorded request/response pairs. While a replay cursor
//! is active every outbound request is answered from the selected group in
//! strict order; any deviation, extra request or leftover entry is reported.
//!
//! The crate also carries the small ARM client and deployment script
//! generator the `armtape` CLI is built from, plus an importer for nock
//! recordings.

#![forbid(unsafe_code)]
// Library documentation is in progress. Public API types have docs;
// internal types will be documented in future releases.
#![allow(missing_docs)]

pub mod arm;
pub mod config;
pub mod deployment;
pub mod error;
pub mod fixture;
pub mod import;
pub mod interceptor;
pub mod model;
pub mod profile;
pub mod reporter;
pub mod transport;

pub use crate::error::{ErrorCode, HarnessError, HarnessResult};
pub use crate::model::*;

/// Run `body` against a replayed fixture, with the fixture's environment and
/// profile installed, and verify the run afterwards.
///
/// The interceptor is claimed before the environment is touched, so a call
/// made while another replay is active fails without disturbing it. The
/// interceptor and environment are released on every path. A replay
/// violation recorded during the run wins over the error `body` returned.
/// Leftover entries are reported only when `body` succeeded. A failure to
/// clean up the profile surfaces only from an otherwise clean run.
pub fn with_replay<T>(
    fixture: ScenarioFixture,
    body: impl FnOnce(&transport::ReplayTransport) -> HarnessResult<T>,
) -> HarnessResult<T> {
    let cursor = interceptor::activate(fixture)?;
    let handle = profile::install(cursor.fixture())?;
    let replay = transport::ReplayTransport::new(cursor);
    let outcome = body(&replay);
    let verification = interceptor::deactivate(replay.into_cursor());
    let released = handle.release();
    if let Some(record) = verification.failures.first() {
        return Err(record.to_error());
    }
    let value = outcome?;
    verification.into_result()?;
    released?;
    Ok(value)
}
