//! CLI smoke tests for upd.
//!
//! These tests verify that all CLI commands run without panicking and
//! return appropriate exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the upd binary, isolated from the caller's environment.
fn upd_cmd() -> Command {
  let mut cmd: Command = cargo_bin_cmd!("upd");
  cmd.env_remove("UPD_ROOT");
  cmd.env_remove("UPD_CONCURRENCY");
  cmd.env_remove("RUST_LOG");
  cmd
}

/// Create a project root holding `manifest` as its updfile.json.
fn temp_project(manifest: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join(".updroot"), "").unwrap();
  std::fs::write(temp.path().join("updfile.json"), manifest).unwrap();
  temp
}

/// A manifest with no rules at all.
const EMPTY_MANIFEST: &str = r#"{ "command_line_templates": [], "source_patterns": [], "rules": [] }"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  upd_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  upd_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("upd"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["graph", "script", "root", "init"] {
    upd_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// Arguments
// =============================================================================

#[test]
fn zero_concurrency_is_rejected() {
  let temp = temp_project(EMPTY_MANIFEST);

  upd_cmd()
    .current_dir(temp.path())
    .args(["-j", "0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn concurrency_from_environment() {
  let temp = temp_project(EMPTY_MANIFEST);

  upd_cmd()
    .current_dir(temp.path())
    .env("UPD_CONCURRENCY", "bogus")
    .assert()
    .failure()
    .stderr(predicate::str::contains("auto"));
}

#[test]
fn all_conflicts_with_targets() {
  let temp = temp_project(EMPTY_MANIFEST);

  upd_cmd()
    .current_dir(temp.path())
    .args(["--all", "dist/a.o"])
    .assert()
    .failure();
}

// =============================================================================
// init & root
// =============================================================================

#[test]
fn init_creates_marker() {
  let temp = TempDir::new().unwrap();
  let dir = temp.path().join("project");

  upd_cmd()
    .arg("init")
    .arg(&dir)
    .assert()
    .success()
    .stdout(predicate::str::contains("Initialized project root"));

  assert!(dir.join(".updroot").exists());
}

#[test]
fn init_twice_succeeds() {
  let temp = TempDir::new().unwrap();

  upd_cmd().arg("init").arg(temp.path()).assert().success();
  upd_cmd()
    .arg("init")
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("already a project root"));
}

#[test]
fn root_is_found_from_subdirectory() {
  let temp = temp_project(EMPTY_MANIFEST);
  let nested = temp.path().join("a/b");
  std::fs::create_dir_all(&nested).unwrap();
  let root = dunce::canonicalize(temp.path()).unwrap();

  upd_cmd()
    .current_dir(&nested)
    .arg("root")
    .assert()
    .success()
    .stdout(format!("{}\n", root.display()));
}

#[test]
fn root_override_from_environment() {
  let temp = temp_project(EMPTY_MANIFEST);
  let elsewhere = TempDir::new().unwrap();
  let root = dunce::canonicalize(temp.path()).unwrap();

  upd_cmd()
    .current_dir(elsewhere.path())
    .env("UPD_ROOT", temp.path())
    .arg("root")
    .assert()
    .success()
    .stdout(format!("{}\n", root.display()));
}

#[test]
fn missing_root_is_a_phase_error() {
  let temp = TempDir::new().unwrap();

  upd_cmd()
    .current_dir(temp.path())
    .assert()
    .code(2)
    .stderr(predicate::str::contains(".updroot"));
}

// =============================================================================
// update
// =============================================================================

#[test]
fn empty_manifest_succeeds() {
  let temp = temp_project(EMPTY_MANIFEST);

  upd_cmd()
    .current_dir(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("0 target(s) up to date"));
}

#[test]
fn missing_manifest_is_a_phase_error() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join(".updroot"), "").unwrap();

  upd_cmd()
    .current_dir(temp.path())
    .assert()
    .code(2)
    .stderr(predicate::str::contains("updfile.json"));
}

#[test]
fn malformed_manifest_is_a_phase_error() {
  let temp = temp_project("{ not json");

  upd_cmd()
    .current_dir(temp.path())
    .assert()
    .code(2)
    .stderr(predicate::str::contains("manifest"));

  assert!(!temp.path().join(".upd").exists());
}
