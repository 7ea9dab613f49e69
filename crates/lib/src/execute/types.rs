//! Types for target execution.
//!
//! This module defines the error types, result types, and configuration
//! for executing the targets of a build graph.

use std::path::PathBuf;

use thiserror::Error;

use crate::depfile::DepfileError;
use crate::signature::SignatureError;

/// Errors that fail a single target.
///
/// None of these abort the build: the target is marked failed, its dependents
/// are skipped and unrelated targets keep running.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The process could not be started.
  #[error("failed to spawn {binary}: {source}")]
  Spawn { binary: String, source: std::io::Error },

  /// Command exited unsuccessfully. `code` is `None` when killed by a signal.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CommandFailed { cmd: String, code: Option<i32> },

  /// The dependency file written by the command could not be used.
  #[error("dependency file: {0}")]
  Depfile(#[from] DepfileError),

  /// The command read the output of a rule it does not declare a dependency on.
  #[error("depends on {dependency}, an output of rule #{rule_ix} that is not a declared dependency")]
  UndeclaredRuleDependency { dependency: String, rule_ix: usize },

  #[error("signature: {0}")]
  Signature(#[from] SignatureError),

  #[error("io error on {}: {source}", .path.display())]
  Io { path: PathBuf, source: std::io::Error },

  /// The task running the command panicked or was cancelled.
  #[error("worker task failed: {0}")]
  Join(String),
}

/// Result of executing a build graph.
#[derive(Debug, Default)]
pub struct BuildReport {
  /// Targets whose command ran and succeeded, in completion order.
  pub executed: Vec<String>,

  /// Targets that were already fresh.
  pub up_to_date: Vec<String>,

  /// Targets that failed, with the cause.
  pub failed: Vec<(String, ExecuteError)>,

  /// Targets not attempted because a predecessor failed.
  /// Maps skipped output -> the failed predecessor that blocked it.
  pub skipped: Vec<(String, String)>,
}

impl BuildReport {
  /// Returns true if every selected target is committed.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty()
  }

  /// Returns the total number of targets processed.
  pub fn total(&self) -> usize {
    self.executed.len() + self.up_to_date.len() + self.failed.len() + self.skipped.len()
  }
}

/// Configuration for execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of commands running at once.
  pub parallelism: usize,

  /// Echo every command line on stdout before running it.
  pub print_commands: bool,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      print_commands: false,
    }
  }
}

/// Get the number of CPUs for default parallelism.
pub fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
