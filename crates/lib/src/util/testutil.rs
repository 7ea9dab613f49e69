//! Test utilities for upd-lib.
//!
//! Helpers for tests that need a project root on disk or need to run small
//! shell commands through the executor.

use std::fs;
use std::path::Path;

/// Returns the shell command and args to execute a shell script.
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

/// Returns the command and args to create an empty file.
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  ("/usr/bin/touch", vec![filename.to_string()])
}

/// Writes `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
  let path = root.join(rel);
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(path, contents).unwrap();
}

/// Reads `root/rel` as a string.
pub fn read_file(root: &Path, rel: &str) -> String {
  fs::read_to_string(root.join(rel)).unwrap()
}
