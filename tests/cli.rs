//! Integration tests for top-level CLI behavior.

use std::process::Command;

fn run_tasksync(args: &[&str], envs: &[(&str, &str)]) -> std::process::Output {
    let bin = env!("CARGO_BIN_EXE_tasksync");
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let mut command = Command::new(bin);
    command
        .args(args)
        .current_dir(dir.path())
        .env_remove("GITHUB_TOKEN")
        .env_remove("GH_TOKEN")
        .env_remove("GITHUB_REPOSITORY")
        .env_remove("RUST_LOG");
    for (key, value) in envs {
        command.env(key, value);
    }
    command.output().expect("failed to run tasksync binary")
}

#[test]
fn help_lists_subcommands() {
    let output = run_tasksync(&["--help"], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for sub in ["sync", "push", "pull", "status", "create"] {
        assert!(stdout.contains(sub), "missing {sub} in help");
    }
}

#[test]
fn sync_help_shows_flags() {
    let output = run_tasksync(&["sync", "--help"], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("--create-new"));
    assert!(stdout.contains("--clean-orphans"));
    assert!(stdout.contains("--strip-orphans"));
    assert!(stdout.contains("--keep-title-prefixes"));
}

#[test]
fn unknown_subcommand_fails() {
    let output = run_tasksync(&["frobnicate"], &[]);
    assert!(!output.status.success());
}

#[test]
fn missing_token_is_a_setup_error() {
    let output = run_tasksync(&["status"], &[("GITHUB_REPOSITORY", "acme/app")]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("GITHUB_TOKEN"));
}

#[test]
fn malformed_repository_is_a_setup_error() {
    let output =
        run_tasksync(&["status"], &[("GITHUB_TOKEN", "t"), ("GITHUB_REPOSITORY", "no-slash")]);
    assert!(!output.status.success());
}

#[test]
fn missing_backend_roots_is_a_setup_error() {
    let output =
        run_tasksync(&["status"], &[("GITHUB_TOKEN", "t"), ("GITHUB_REPOSITORY", "acme/app")]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("no source backend"));
}
