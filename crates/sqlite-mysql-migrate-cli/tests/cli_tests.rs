//! CLI integration tests for sqlite-mysql-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for errors raised before any database is reached.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

/// Get a command for the sqlite-mysql-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("sqlite-mysql-migrate").unwrap()
}

/// Write a valid config whose source points at `sqlite_path`.
fn config_file(sqlite_path: &Path) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  path: {}", sqlite_path.display()).unwrap();
    writeln!(file, "target:").unwrap();
    writeln!(file, "  host: 127.0.0.1").unwrap();
    writeln!(file, "  port: 1").unwrap();
    writeln!(file, "  database: kuma").unwrap();
    writeln!(file, "  user: kuma").unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--drop"))
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--collation"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sqlite-mysql-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_and_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  path: app.db").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1);
}

#[test]
fn test_bad_collation_override_exits_with_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_file(&dir.path().join("kuma.db"));

    cmd()
        .args([
            "--config",
            config.path().to_str().unwrap(),
            "run",
            "--collation",
            "latin1_swedish_ci",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("utf8mb4"));
}

#[test]
fn test_drop_without_yes_needs_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_file(&dir.path().join("kuma.db"));

    cmd()
        .args(["--config", config.path().to_str().unwrap(), "run", "--drop"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_missing_sqlite_file_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_file(&dir.path().join("missing.db"));

    cmd()
        .args(["--config", config.path().to_str().unwrap(), "run", "--yes"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("file does not exist"));
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
