//! Common test helper functions.
//!
//! These utilities reduce boilerplate in integration tests: scratch
//! directories, recursive cleanup and fixture serialization.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use armtape::model::ScenarioFixture;

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Create a unique temporary directory for a test.
///
/// The name combines the prefix, the process id, a timestamp and a counter so
/// parallel tests never share a directory. The directory is created
/// immediately.
///
/// # Panics
///
/// Panics if the directory cannot be created.
///
/// # Example
///
/// ```ignore
/// let dir = temp_dir("deploy-basic");
/// // dir is something like /tmp/armtape-deploy-basic-4242-1703520000000-0
/// ```
#[must_use]
pub fn temp_dir(prefix: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let index = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "armtape-{prefix}-{}-{stamp}-{index}",
        std::process::id()
    ));

    #[allow(clippy::expect_used)]
    ensure_path_exists(&dir).expect("failed to create temp directory");

    dir
}

/// Create `path` and any missing parents; existing directories are left alone.
pub fn ensure_path_exists(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
}

/// Remove a file or directory tree if it exists.
///
/// Missing paths are not an error, so teardown can run unconditionally.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if !metadata.is_dir() {
        return fs::remove_file(path);
    }
    for entry in fs::read_dir(path)? {
        remove_path(&entry?.path())?;
    }
    fs::remove_dir(path)
}

/// Write a fixture to a JSON file.
///
/// # Panics
///
/// Panics if serialization or file writing fails.
///
/// # Example
///
/// ```ignore
/// let fixture = FixtureBuilder::new("nsg-show").group(...).build();
/// write_fixture(&dir.join("fixture.json"), &fixture);
/// ```
pub fn write_fixture(path: &Path, fixture: &ScenarioFixture) {
    #[allow(clippy::expect_used)]
    let data = serde_json::to_vec_pretty(fixture).expect("failed to serialize fixture");

    #[allow(clippy::expect_used)]
    fs::write(path, data).expect("failed to write fixture file");
}

/// Read a text file produced by a command under test.
///
/// # Panics
///
/// Panics with the missing path when the file does not exist.
#[must_use]
#[allow(clippy::panic)]
pub fn read_file(path: &Path) -> String {
    fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("file doesn't exist: {} ({err})", path.display()))
}
