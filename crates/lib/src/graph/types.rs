//! Types for the dependency graph.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::manifest::CommandLine;
use crate::pattern::CaptureArityError;

/// A concrete output to produce, with everything needed to produce it.
///
/// All paths are local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
  pub output: String,
  pub rule_ix: usize,
  pub command_line_ix: usize,
  /// Input paths, in the order they were matched.
  pub inputs: Vec<String>,
  /// Explicit dependencies.
  pub dependencies: Vec<String>,
  /// Order-only dependencies.
  pub order_only: Vec<String>,
  /// Where the command writes its dependency file, if its template asks for one.
  pub dependency_file: Option<String>,
  pub command_line: CommandLine,
}

impl Target {
  /// Paths whose content decides whether the target is stale.
  ///
  /// Order-only dependencies are excluded unless they are also explicit.
  pub fn fingerprint_paths(&self) -> BTreeSet<&str> {
    self
      .inputs
      .iter()
      .chain(&self.dependencies)
      .map(String::as_str)
      .collect()
  }

  /// Whether `path` was declared as a dependency of any kind.
  pub fn declares(&self, path: &str) -> bool {
    self
      .inputs
      .iter()
      .chain(&self.dependencies)
      .chain(&self.order_only)
      .any(|p| p == path)
  }
}

/// How a target relates to one of its predecessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
  Input,
  Dependency,
  OrderOnly,
}

/// Errors from building the dependency graph.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("dependency cycle: {}", .cycle.join(" -> "))]
  CyclicDependency { cycle: Vec<String> },

  #[error("output '{output}' is produced by both rule #{first_rule} and rule #{second_rule}")]
  AmbiguousOutput {
    output: String,
    first_rule: usize,
    second_rule: usize,
  },

  #[error("rule #{rule_ix}: {source}")]
  CaptureArity { rule_ix: usize, source: CaptureArityError },

  #[error("rule #{rule_ix} expands to '{output}', which is not a path inside the project")]
  InvalidOutput { rule_ix: usize, output: String },

  #[error("unknown target '{0}'")]
  UnknownTarget(String),
}
