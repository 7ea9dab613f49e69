//! `upd graph` and `upd script` integration tests.

use predicates::prelude::*;

use super::common::{CONCAT_TEMPLATE, TestEnv, manifest};

fn project() -> TestEnv {
  let env = TestEnv::with_manifest(&manifest(
    &[CONCAT_TEMPLATE],
    &["src/(*).txt"],
    r#"[{ "command_line_ix": 0, "inputs": [{ "source_ix": 0 }], "output": "out/$1.copy" }]"#,
  ));
  env.write_file("src/a.txt", "a\n");
  env
}

#[test]
fn graph_prints_dot() {
  let env = project();

  env
    .upd_cmd()
    .arg("graph")
    .assert()
    .success()
    .stdout(
      predicate::str::starts_with("digraph upd {")
        .and(predicate::str::contains("\"src/a.txt\" -> \"out/a.copy\" [label=\"/bin/sh\"];")),
    );

  assert!(!env.exists(".upd"));
}

#[test]
fn script_runs_the_build() {
  let env = project();

  let output = env.upd_cmd().arg("script").assert().success().get_output().stdout.clone();
  let script = String::from_utf8(output).unwrap();
  assert!(script.starts_with("#!/bin/sh\nset -e\n"));
  assert!(script.contains("mkdir -p out\n"));
  assert!(!env.exists(".upd"));

  env.write_file("build.sh", &script);
  let status = std::process::Command::new("/bin/sh")
    .arg("build.sh")
    .current_dir(env.temp.path())
    .status()
    .unwrap();
  assert!(status.success());
  assert_eq!(env.read_file("out/a.copy"), "a\n");
}

#[test]
fn graph_rejects_unknown_target() {
  let env = project();

  env
    .upd_cmd()
    .args(["graph", "out/zzz.copy"])
    .assert()
    .code(2)
    .stderr(predicate::str::contains("unknown target"));
}
