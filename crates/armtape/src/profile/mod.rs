//! Environment and credential-profile installation for a replay run.
//!
//! [`install`] makes the fixture's environment variables and mocked profile
//! visible to the process; the returned [`ScopedHandle`] puts every touched
//! variable back the way it was when released or dropped.

use crate::error::{HarnessError, HarnessResult};
use crate::model::{Profile, ScenarioFixture};
use serde_json::json;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Environment variable naming the profile file the CLI reads.
pub const PROFILE_ENV: &str = "ARMTAPE_PROFILE";

const PROFILE_FILE_NAME: &str = "profile.json";

/// Restores the environment captured by [`install`].
#[derive(Debug)]
pub struct ScopedHandle {
    /// Previous values in the order they were overwritten.
    saved: Vec<(String, Option<OsString>)>,
    profile_dir: Option<TempDir>,
    profile_path: PathBuf,
}

impl ScopedHandle {
    /// Location of the installed profile file.
    pub fn profile_path(&self) -> &Path {
        &self.profile_path
    }

    /// Restore the environment and remove the temporary profile.
    pub fn release(mut self) -> HarnessResult<()> {
        self.restore();
        match self.profile_dir.take() {
            Some(dir) => dir
                .close()
                .map_err(|err| HarnessError::io("failed to remove temporary profile", err)),
            None => Ok(()),
        }
    }

    fn restore(&mut self) {
        while let Some((key, previous)) = self.saved.pop() {
            match previous {
                Some(value) => env::set_var(&key, value),
                None => env::remove_var(&key),
            }
        }
    }
}

impl Drop for ScopedHandle {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Install the fixture environment and profile for the current process.
pub fn install(fixture: &ScenarioFixture) -> HarnessResult<ScopedHandle> {
    let profile_dir = tempfile::Builder::new()
        .prefix("armtape-profile-")
        .tempdir()
        .map_err(|err| HarnessError::io("failed to create profile directory", err))?;
    let profile_path = profile_dir.path().join(PROFILE_FILE_NAME);
    write_profile_file(&profile_path, &fixture.profile)?;

    let mut handle = ScopedHandle {
        saved: Vec::with_capacity(fixture.environment.len() + 1),
        profile_dir: Some(profile_dir),
        profile_path,
    };
    for (key, value) in &fixture.environment {
        set_scoped(&mut handle.saved, key, value);
    }
    let profile_value = handle.profile_path.clone();
    set_scoped(&mut handle.saved, PROFILE_ENV, profile_value);
    debug!(
        scenario = %fixture.name,
        variables = fixture.environment.len(),
        profile = %handle.profile_path.display(),
        "installed fixture environment"
    );
    Ok(handle)
}

fn set_scoped(
    saved: &mut Vec<(String, Option<OsString>)>,
    key: &str,
    value: impl AsRef<std::ffi::OsStr>,
) {
    saved.push((key.to_string(), env::var_os(key)));
    env::set_var(key, value);
}

pub fn write_profile_file(path: &Path, profile: &Profile) -> HarnessResult<()> {
    let data = serde_json::to_string_pretty(profile)
        .map_err(|err| HarnessError::protocol("failed to serialize profile", err))?;
    fs::write(path, data).map_err(|err| HarnessError::io("failed to write profile", err))
}

pub fn load_profile_file(path: &Path) -> HarnessResult<Profile> {
    let data = fs::read_to_string(path).map_err(|err| {
        HarnessError::new(
            crate::error::ErrorCode::Io,
            format!("failed to read profile {}", path.display()),
            json!({ "path": path.display().to_string(), "source": err.to_string() }),
        )
    })?;
    serde_json::from_str(&data)
        .map_err(|err| HarnessError::protocol("failed to parse profile", err))
}
