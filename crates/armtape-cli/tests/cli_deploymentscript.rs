// Test module - relaxed lint rules
#![allow(clippy::default_trait_access)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::inefficient_to_string)]
#![allow(clippy::panic)]
#![allow(clippy::manual_assert)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::cast_possible_truncation)]
#![allow(missing_docs)]

//! `site deploymentscript` end to end.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use armtape_fixtures::read_file;
use tempfile::TempDir;

fn armtape_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_armtape"));
    cmd.env_remove("RUST_LOG").env("NO_COLOR", "1");
    cmd
}

fn deploymentscript(root: &Path, flags: &[&str]) -> Output {
    armtape_bin()
        .args(["site", "deploymentscript", "-y", "-r"])
        .arg(root)
        .args(flags)
        .output()
        .expect("failed to execute")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn generates_script_for_each_site_kind() {
    let cases = [
        ("--basic", "Web Site", "Handling Basic Web Site deployment."),
        ("--php", "Web Site", "Handling Basic Web Site deployment."),
        ("--python", "Python Web Site", "Handling python deployment."),
        (
            "--aspWebSite",
            ".NET Web Site",
            "Handling .NET Web Site deployment.",
        ),
    ];
    for (flag, label, handling) in cases {
        let repo = TempDir::new().unwrap();
        let output = deploymentscript(repo.path(), &[flag]);

        assert!(output.status.success(), "{flag}: {}", stderr(&output));
        let out = stdout(&output);
        assert!(
            out.contains(&format!("Generating deployment script for {label}")),
            "{flag}: {out}"
        );
        assert!(out.contains("Generated deployment script (deploy.cmd and .deployment)"));
        assert!(read_file(&repo.path().join("deploy.cmd")).contains(handling));
        assert_eq!(
            read_file(&repo.path().join(".deployment")),
            "[config]\ncommand = deploy.cmd\n"
        );
    }
}

#[test]
fn detects_node_site_and_writes_bash_script() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("app.js"), "").unwrap();

    let output = deploymentscript(repo.path(), &["-t", "bash"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Generating deployment script for node.js Web Site"));
    assert!(read_file(&repo.path().join("deploy.sh")).contains("Handling node.js deployment."));
    assert_eq!(
        read_file(&repo.path().join(".deployment")),
        "[config]\ncommand = bash deploy.sh\n"
    );
}

#[test]
fn conflicting_selectors_exit_with_invalid_argument() {
    let combos: [&[&str]; 4] = [
        &["--aspWAP", "--aspWebSite"],
        &["--aspWAP", "--node"],
        &["--php", "--python"],
        &["--node", "--basic"],
    ];
    for flags in combos {
        let repo = TempDir::new().unwrap();
        let output = deploymentscript(repo.path(), flags);

        assert_eq!(output.status.code(), Some(1), "{flags:?}");
        assert!(
            stderr(&output).contains("specify only one of these flags"),
            "{flags:?}: {}",
            stderr(&output)
        );
        assert!(!repo.path().join("deploy.cmd").exists());
    }
}

#[test]
fn asp_wap_without_project_file_reports_missing_argument() {
    let repo = TempDir::new().unwrap();
    let output = deploymentscript(repo.path(), &["--aspWAP"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("argument missing"));
}

#[test]
fn asp_wap_with_project_file_builds_it() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("Site.csproj"), "<Project />").unwrap();

    let output = deploymentscript(repo.path(), &["--aspWAP", "Site.csproj"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains(".NET Web Application"));
    assert!(read_file(&repo.path().join("deploy.cmd"))
        .contains("Handling .NET Web Application deployment."));
}

#[test]
fn node_without_entry_point_fails() {
    let repo = TempDir::new().unwrap();
    let output = deploymentscript(repo.path(), &["--node"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Missing server.js/app.js file"));
}

#[test]
fn existing_script_is_kept_without_quiet() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("deploy.cmd"), "keep").unwrap();

    let output = armtape_bin()
        .args(["site", "deploymentscript", "--basic", "-r"])
        .arg(repo.path())
        .output()
        .expect("failed to execute");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("use -y to overwrite"));
    assert_eq!(read_file(&repo.path().join("deploy.cmd")), "keep");
}

#[test]
fn unknown_script_type_is_rejected() {
    let repo = TempDir::new().unwrap();
    let output = deploymentscript(repo.path(), &["--basic", "-t", "powershell"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(!repo.path().join(".deployment").exists());
}
