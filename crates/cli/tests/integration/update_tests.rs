//! Update command integration tests.

use predicates::prelude::*;

use super::common::{CONCAT_TEMPLATE, FAILING_TEMPLATE, TestEnv, manifest};

fn copy_project() -> TestEnv {
  let env = TestEnv::with_manifest(&manifest(
    &[CONCAT_TEMPLATE],
    &["src/(**/*).txt"],
    r#"[{ "command_line_ix": 0, "inputs": [{ "source_ix": 0 }], "output": "dist/$1.copy" },
        { "command_line_ix": 0, "inputs": [{ "rule_ix": 0 }], "output": "dist/bundle.txt" }]"#,
  ));
  env.write_file("src/a.txt", "alpha\n");
  env.write_file("src/nested/b.txt", "beta\n");
  env
}

#[test]
fn update_builds_everything() {
  let env = copy_project();

  env
    .upd_cmd()
    .assert()
    .success()
    .stdout(predicate::str::contains("Updated 3 of 3 target(s)"));

  assert_eq!(env.read_file("dist/a.copy"), "alpha\n");
  assert_eq!(env.read_file("dist/nested/b.copy"), "beta\n");
  assert_eq!(env.read_file("dist/bundle.txt"), "alpha\nbeta\n");
  assert!(env.exists(".upd/log"));
}

#[test]
fn update_is_idempotent() {
  let env = copy_project();

  env.upd_cmd().assert().success();
  env
    .upd_cmd()
    .arg("--all")
    .assert()
    .success()
    .stdout(predicate::str::contains("3 target(s) up to date"));
}

#[test]
fn update_single_target_from_subdirectory() {
  let env = copy_project();
  let dist = env.temp.path().join("dist");
  std::fs::create_dir_all(&dist).unwrap();

  env
    .upd_cmd_in(&dist)
    .arg("a.copy")
    .assert()
    .success()
    .stdout(predicate::str::contains("Updated 1 of 1 target(s)"));

  assert!(env.exists("dist/a.copy"));
  assert!(!env.exists("dist/bundle.txt"));
}

#[test]
fn requested_target_pulls_in_predecessors() {
  let env = copy_project();

  env
    .upd_cmd()
    .arg("dist/bundle.txt")
    .assert()
    .success()
    .stdout(predicate::str::contains("Updated 3 of 3 target(s)"));
}

#[test]
fn unknown_target_is_a_phase_error() {
  let env = copy_project();

  env
    .upd_cmd()
    .arg("dist/nothing.copy")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("unknown target 'dist/nothing.copy'"));
}

#[test]
fn edited_source_rebuilds_its_chain() {
  let env = copy_project();
  env.upd_cmd().assert().success();

  env.write_file("src/a.txt", "alpha, edited\n");
  env
    .upd_cmd()
    .assert()
    .success()
    .stdout(predicate::str::contains("Updated 2 of 3 target(s)"));

  assert_eq!(env.read_file("dist/bundle.txt"), "alpha, edited\nbeta\n");
}

#[test]
fn print_commands_echoes_command_lines() {
  let env = copy_project();

  env
    .upd_cmd()
    .args(["--print-commands", "-j", "1", "dist/a.copy"])
    .assert()
    .success()
    .stdout(predicate::str::contains("$ /bin/sh -c").and(predicate::str::contains("dist/a.copy src/a.txt")));
}

#[test]
fn failed_target_exits_with_one() {
  let env = TestEnv::with_manifest(&manifest(
    &[CONCAT_TEMPLATE, FAILING_TEMPLATE],
    &["good.txt", "bad.txt"],
    r#"[{ "command_line_ix": 0, "inputs": [{ "source_ix": 0 }], "output": "good.out" },
        { "command_line_ix": 1, "inputs": [{ "source_ix": 1 }], "output": "bad.out" },
        { "command_line_ix": 0, "inputs": [{ "rule_ix": 1 }], "output": "after-bad.out" }]"#,
  ));
  env.write_file("good.txt", "good\n");
  env.write_file("bad.txt", "bad\n");

  env
    .upd_cmd()
    .assert()
    .code(1)
    .stderr(
      predicate::str::contains("bad.out: command failed")
        .and(predicate::str::contains("after-bad.out: skipped"))
        .and(predicate::str::contains("1 target(s) failed, 1 skipped")),
    );

  assert_eq!(env.read_file("good.out"), "good\n");
  assert!(!env.exists("after-bad.out"));
}

#[test]
fn ambiguous_output_is_a_phase_error() {
  let env = TestEnv::with_manifest(&manifest(
    &[CONCAT_TEMPLATE],
    &["a.txt"],
    r#"[{ "command_line_ix": 0, "inputs": [{ "source_ix": 0 }], "output": "same.out" },
        { "command_line_ix": 0, "inputs": [{ "source_ix": 0 }], "output": "same.out" }]"#,
  ));
  env.write_file("a.txt", "a\n");

  env
    .upd_cmd()
    .assert()
    .code(2)
    .stderr(predicate::str::contains("produced by both rule #0 and rule #1"));

  assert!(!env.exists(".upd"));
}

#[test]
fn cycle_is_a_phase_error() {
  let env = TestEnv::with_manifest(&manifest(
    &[CONCAT_TEMPLATE],
    &[],
    r#"[{ "command_line_ix": 0, "inputs": [{ "rule_ix": 1 }], "output": "a.out" },
        { "command_line_ix": 0, "inputs": [{ "rule_ix": 0 }], "output": "b.out" }]"#,
  ));

  env
    .upd_cmd()
    .assert()
    .code(2)
    .stderr(predicate::str::contains("dependency cycle"));
}
