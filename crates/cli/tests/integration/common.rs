//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Concatenates its inputs into `$0`. Templates using it must pass the output
/// first, then the inputs.
pub const CONCAT_TEMPLATE: &str = r#"{
  "binary_path": "/bin/sh",
  "arguments": [{ "literals": ["-c", "cat \"$@\" > \"$0\""], "variables": ["output_file", "input_files"] }]
}"#;

/// Always fails with exit code 7.
pub const FAILING_TEMPLATE: &str = r#"{ "binary_path": "/bin/sh", "arguments": [{ "literals": ["-c", "exit 7"] }] }"#;

/// Isolated project environment.
///
/// Each test gets its own temporary project root containing `.updroot`.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create a project root with the given manifest.
  pub fn with_manifest(manifest: &str) -> Self {
    let env = Self::empty();
    env.write_file("updfile.json", manifest);
    env
  }

  /// Create a project root without a manifest.
  pub fn empty() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join(".updroot"), "").unwrap();
    Self { temp }
  }

  /// Canonical project root.
  pub fn root(&self) -> PathBuf {
    let p = self.temp.path().to_path_buf();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Read a file relative to the project root.
  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(relative_path))
      .unwrap_or_else(|e| panic!("Failed to read {}: {}", relative_path, e))
  }

  pub fn exists(&self, relative_path: &str) -> bool {
    self.temp.path().join(relative_path).exists()
  }

  /// Get a pre-configured Command for the upd binary, run from the root.
  pub fn upd_cmd(&self) -> Command {
    self.upd_cmd_in(self.temp.path())
  }

  /// Get a Command for the upd binary, run from `dir`.
  pub fn upd_cmd_in(&self, dir: &Path) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("upd");
    cmd.current_dir(dir);
    cmd.env_remove("UPD_ROOT");
    cmd.env_remove("RUST_LOG");
    cmd.env("UPD_CONCURRENCY", "2");
    cmd
  }
}

/// Build a manifest from templates, source patterns and a JSON rules array.
pub fn manifest(templates: &[&str], patterns: &[&str], rules: &str) -> String {
  let patterns: Vec<String> = patterns.iter().map(|p| format!("\"{}\"", p)).collect();
  format!(
    r#"{{ "command_line_templates": [{}], "source_patterns": [{}], "rules": {} }}"#,
    templates.join(","),
    patterns.join(","),
    rules
  )
}
