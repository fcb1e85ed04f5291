//! Runtime knobs read from the environment.

use crate::error::{HarnessError, HarnessResult};
use crate::profile::PROFILE_ENV;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Fixture to replay instead of talking to the network.
pub const REPLAY_ENV: &str = "ARMTAPE_REPLAY";
/// Override of the cloud environment's resource manager endpoint.
pub const ARM_ENDPOINT_ENV: &str = "ARMTAPE_ARM_ENDPOINT";
/// Poll interval for long-running operations, in milliseconds.
pub const POLL_INTERVAL_ENV: &str = "ARMTAPE_POLL_INTERVAL_MS";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub replay: Option<PathBuf>,
    pub profile_path: Option<PathBuf>,
    pub arm_endpoint: Option<String>,
    pub poll_interval: Option<Duration>,
}

impl Settings {
    pub fn from_env() -> HarnessResult<Self> {
        let poll_interval = match non_empty(POLL_INTERVAL_ENV) {
            Some(raw) => Some(Duration::from_millis(raw.parse::<u64>().map_err(|_| {
                HarnessError::cli_invalid_arg(format!(
                    "{POLL_INTERVAL_ENV} must be a whole number of milliseconds, got '{raw}'"
                ))
            })?)),
            None => None,
        };
        Ok(Self {
            replay: non_empty(REPLAY_ENV).map(PathBuf::from),
            profile_path: non_empty(PROFILE_ENV)
                .map(PathBuf::from)
                .or_else(default_profile_path),
            arm_endpoint: non_empty(ARM_ENDPOINT_ENV),
            poll_interval,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// `$HOME/.armtape/profile.json` (`%USERPROFILE%` on Windows).
pub fn default_profile_path() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".armtape").join("profile.json"))
}
