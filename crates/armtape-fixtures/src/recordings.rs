//! Recorded ARM scenarios shipped under `recordings/`.
//!
//! `nsg_delete`, `vmss_create_or_update` and `vm_show` are JSON fixtures with
//! an `http` and an `https` alternative each. The `nock/` directory holds the same
//! scenarios as nock recordings for importer tests.

use std::path::PathBuf;

use armtape::model::ScenarioFixture;

/// Subscription recorded in `vmss_create_or_update` and `vm_show`.
pub const VMSS_SUBSCRIPTION_ID: &str = "e33f361b-53c2-4cc7-b829-78906708387b";

fn recordings_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("recordings")
}

/// Path of the JSON recording `name` (without extension).
#[must_use]
pub fn recording_path(name: &str) -> PathBuf {
    recordings_dir().join(format!("{name}.json"))
}

/// Path of a nock recording by its scenario name.
#[must_use]
pub fn nock_recording_path(scenario: &str) -> PathBuf {
    recordings_dir()
        .join("nock")
        .join(format!("{scenario}.nock.js"))
}

/// Load and validate the JSON recording `name`.
///
/// # Panics
///
/// Panics if the recording is missing or invalid.
#[must_use]
pub fn load_recording(name: &str) -> ScenarioFixture {
    let path = recording_path(name);
    armtape::fixture::load_fixture_file(&path)
        .unwrap_or_else(|err| panic!("failed to load recording {}: {err}", path.display()))
}
