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

//! Global flags, help output and shell completions.

use std::process::Command;

fn armtape_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_armtape"))
}

#[test]
fn color_flag_accepts_modes() {
    for mode in ["auto", "always", "never"] {
        let output = armtape_bin()
            .arg(format!("--color={mode}"))
            .arg("--help")
            .output()
            .expect("failed to execute");

        assert!(
            output.status.success(),
            "--color={mode} should be accepted: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

#[test]
fn color_flag_rejects_invalid() {
    let output = armtape_bin()
        .arg("--color=invalid")
        .arg("--help")
        .output()
        .expect("failed to execute");

    assert!(!output.status.success(), "--color=invalid should be rejected");
}

#[test]
fn help_lists_command_groups() {
    let output = armtape_bin().arg("--help").output().expect("failed to execute");

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["site", "network", "compute", "fixture", "completions"] {
        assert!(stdout.contains(command), "help should list {command}");
    }
    assert!(stdout.contains("--replay"));
}

#[test]
fn deploymentscript_help_keeps_camel_case_flags() {
    let output = armtape_bin()
        .args(["site", "deploymentscript", "--help"])
        .output()
        .expect("failed to execute");

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--aspWAP", "--aspWebSite", "--repositoryRoot", "--solutionFile", "--scriptType"] {
        assert!(stdout.contains(flag), "help should mention {flag}");
    }
}

#[test]
fn verbose_flag_is_global() {
    let output = armtape_bin()
        .args(["network", "nsg", "show", "-v", "--help"])
        .output()
        .expect("failed to execute");

    assert!(output.status.success());
}

#[test]
fn completions_generate_for_each_shell() {
    for shell in ["bash", "zsh", "fish"] {
        let output = armtape_bin()
            .args(["completions", shell])
            .output()
            .expect("failed to execute");

        assert!(output.status.success(), "{shell} completions failed");
        assert!(
            String::from_utf8_lossy(&output.stdout).contains("armtape"),
            "{shell} completions should name the binary"
        );
    }
}
