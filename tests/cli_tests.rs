//! CLI integration tests for mnemo-server
//!
//! Runs the built binary against temporary directories.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const SECRET: &str = "cli-test-secret-that-is-long-enough";

fn mnemo(args: &[&str], dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mnemo-server"));
    cmd.args(args)
        .current_dir(dir)
        .env_remove("JWT_SECRET");
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("Failed to execute mnemo-server")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// =============================================================================
// Help and Version
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = run(&mut mnemo(&["--help"], dir.path()));

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Usage"));
    assert!(text.contains("init"));
    assert!(text.contains("token"));
    assert!(text.contains("config"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    let output = run(&mut mnemo(&["--version"], dir.path()));

    assert!(output.status.success());
    assert!(stdout(&output).contains("mnemo-server"));
}

// =============================================================================
// Init
// =============================================================================

#[test]
fn test_init_creates_project_files() {
    let dir = TempDir::new().unwrap();
    let output = run(&mut mnemo(&["init", "--port", "4000"], dir.path()));

    assert!(output.status.success());
    let config = fs::read_to_string(dir.path().join("mnemo.toml")).unwrap();
    assert!(config.contains("port = 4000"));
    assert!(config.contains("[memory]"));
    assert!(dir.path().join("data").is_dir());
    assert!(dir.path().join(".env.example").is_file());
}

#[test]
fn test_init_keeps_existing_config() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("mnemo.toml"), "# hand written\n").unwrap();

    let output = run(&mut mnemo(&["init"], dir.path()));
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("mnemo.toml")).unwrap(),
        "# hand written\n"
    );

    let output = run(&mut mnemo(&["init", "--force"], dir.path()));
    assert!(output.status.success());
    assert!(fs::read_to_string(dir.path().join("mnemo.toml"))
        .unwrap()
        .contains("[server]"));
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_validate_anonymous_project() {
    let dir = TempDir::new().unwrap();
    assert!(run(&mut mnemo(&["init", "--anonymous"], dir.path()))
        .status
        .success());

    let output = run(&mut mnemo(&["config", "--validate"], dir.path()));
    assert!(output.status.success());
    assert!(stdout(&output).contains("Configuration is valid"));
}

#[test]
fn test_config_requires_jwt_secret() {
    let dir = TempDir::new().unwrap();
    assert!(run(&mut mnemo(&["init"], dir.path())).status.success());

    let output = run(&mut mnemo(&["config", "--validate"], dir.path()));
    assert!(!output.status.success());

    let output = run(mnemo(&["config", "--validate"], dir.path()).env("JWT_SECRET", SECRET));
    assert!(output.status.success());
}

#[test]
fn test_config_full_prints_toml() {
    let dir = TempDir::new().unwrap();
    assert!(run(&mut mnemo(&["init", "--anonymous"], dir.path()))
        .status
        .success());

    let output = run(&mut mnemo(&["config", "--full"], dir.path()));
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("history_window = 8"));
    assert!(text.contains("allow_anonymous = true"));
}

// =============================================================================
// Token
// =============================================================================

#[test]
fn test_token_issues_jwt() {
    let dir = TempDir::new().unwrap();
    assert!(run(&mut mnemo(&["init"], dir.path())).status.success());

    let output = run(mnemo(&["token", "--user", "alice"], dir.path()).env("JWT_SECRET", SECRET));
    assert!(output.status.success());
    let token = stdout(&output);
    assert_eq!(token.trim().split('.').count(), 3);
}

#[test]
fn test_token_without_secret_fails() {
    let dir = TempDir::new().unwrap();
    assert!(run(&mut mnemo(&["init", "--anonymous"], dir.path()))
        .status
        .success());

    let output = run(&mut mnemo(&["token", "--user", "alice"], dir.path()));
    assert!(!output.status.success());
}
