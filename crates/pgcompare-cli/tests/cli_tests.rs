//! CLI integration tests for pgcompare.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for configuration error conditions. Nothing here
//! requires a live database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the pgcompare binary.
fn cmd() -> Command {
    Command::cargo_bin("pgcompare").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_actions() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("copy-table"));
}

#[test]
fn test_compare_subcommand_help() {
    cmd()
        .args(["compare", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--map-only"));
}

#[test]
fn test_global_flags_in_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--batch"))
        .stdout(predicate::str::contains("--project"))
        .stdout(predicate::str::contains("--table"))
        .stdout(predicate::str::contains("--report"))
        .stdout(predicate::str::contains("--fail-on-diff"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pgcompare"));
}

// =============================================================================
// Configuration Error Tests
// =============================================================================

#[test]
fn test_missing_config_file_exits_nonzero() {
    cmd()
        .args(["--config", "/nonexistent/pgcompare.properties", "init"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_unknown_dialect_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "repo-host=localhost").unwrap();
    writeln!(file, "repo-dbname=pgcompare").unwrap();
    writeln!(file, "repo-user=pgcompare").unwrap();
    writeln!(file, "source-type=sybase").unwrap();
    file.flush().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "compare"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unknown database type"));
}

#[test]
fn test_compare_requires_endpoints() {
    // A repo-only config is enough for init but not for compare.
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "repo-host=localhost").unwrap();
    writeln!(file, "repo-dbname=pgcompare").unwrap();
    writeln!(file, "repo-user=pgcompare").unwrap();
    file.flush().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "compare"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Missing mandatory option"));
}

#[test]
fn test_copy_table_requires_both_aliases() {
    cmd()
        .args(["copy-table", "only-one"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_action_rejected() {
    cmd().arg("frobnicate").assert().failure();
}
