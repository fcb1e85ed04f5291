//! Test utilities and recorded scenarios for armtape integration tests.
//!
//! - [`FixtureBuilder`] - Fluent API for constructing replay fixtures
//! - [`GroupBuilder`] / [`InteractionBuilder`] - Alternative groups and their entries
//! - [`load_recording`] - Recorded ARM scenarios shipped with this crate
//! - [`temp_dir`] / [`remove_path`] - Scratch directories and teardown
//!
//! # Example
//!
//! ```ignore
//! use armtape_fixtures::{load_recording, temp_dir, write_fixture};
//!
//! let dir = temp_dir("nsg-delete");
//! let fixture = load_recording("nsg_delete");
//! write_fixture(&dir.join("fixture.json"), &fixture);
//! ```

// Test fixtures crate - relaxed lints for test utilities
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::panic)]

pub mod builders;
pub mod helpers;
pub mod recordings;

// Re-export commonly used items at crate root
pub use builders::{
    test_profile, FixtureBuilder, GroupBuilder, InteractionBuilder, TEST_SUBSCRIPTION_ID,
};
pub use helpers::{ensure_path_exists, read_file, remove_path, temp_dir, write_fixture};
pub use recordings::{
    load_recording, nock_recording_path, recording_path, VMSS_SUBSCRIPTION_ID,
};
