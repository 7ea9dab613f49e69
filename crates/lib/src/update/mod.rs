//! Update orchestration.
//!
//! This module provides the core logic for the `upd` command: find the
//! project root, load the manifest, resolve patterns, build the graph and
//! bring the requested targets up to date.
//!
//! Everything before execution is side-effect free. A manifest, pattern or
//! graph error aborts the run before the state directory is even created.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{DEPFILE_DIR, ROOT_MARKER, STATE_DIR};
use crate::execute::{BuildReport, ExecuteConfig, execute};
use crate::graph::{BuildGraph, GraphError};
use crate::manifest::{Manifest, ManifestError};
use crate::pattern::{ResolveError, resolve_all};
use crate::signature::{SignatureError, SignatureStore};
use crate::util::path::local_path;

/// Options for the update operation.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
  /// Project root, the directory holding `.updroot`.
  pub root: PathBuf,
  /// Directory the requested targets are relative to.
  pub working_dir: PathBuf,
  /// Targets to update. If empty, every target is updated.
  pub targets: Vec<String>,
  pub execute: ExecuteConfig,
}

/// Result of an update run that got as far as execution.
#[derive(Debug)]
pub struct UpdateResult {
  /// Number of targets selected for the run.
  pub selected: usize,
  pub report: BuildReport,
}

/// Errors that abort an update before or around execution.
///
/// Failures of individual targets are not errors; they are listed in the
/// [`BuildReport`].
#[derive(Debug, Error)]
pub enum UpdateError {
  /// No `.updroot` marker in the start directory or any of its ancestors.
  #[error("no {marker} found in {} or any parent directory", .start.display())]
  RootNotFound { marker: &'static str, start: PathBuf },

  #[error("manifest: {0}")]
  Manifest(#[from] ManifestError),

  #[error("pattern resolution: {0}")]
  Resolve(#[from] ResolveError),

  #[error("graph: {0}")]
  Graph(#[from] GraphError),

  /// A requested target lies outside the project root.
  #[error("target '{0}' is outside the project root")]
  OutOfRoot(String),

  #[error("failed to prepare {}: {source}", .path.display())]
  StateDir { path: PathBuf, source: std::io::Error },

  #[error("signature store: {0}")]
  Signature(#[from] SignatureError),
}

/// Find the project root by walking up from `start`.
///
/// # Errors
///
/// Returns `UpdateError::RootNotFound` if no ancestor holds a `.updroot`
/// marker.
pub fn find_root(start: &Path) -> Result<PathBuf, UpdateError> {
  for dir in start.ancestors() {
    if dir.join(ROOT_MARKER).is_file() {
      debug!(root = %dir.display(), "found project root");
      return Ok(dir.to_path_buf());
    }
  }
  Err(UpdateError::RootNotFound {
    marker: ROOT_MARKER,
    start: start.to_path_buf(),
  })
}

/// Mark `dir` as a project root. Returns false if it already was one.
pub fn init_root(dir: &Path) -> Result<bool, UpdateError> {
  let marker = dir.join(ROOT_MARKER);
  if marker.is_file() {
    return Ok(false);
  }
  std::fs::write(&marker, b"").map_err(|source| UpdateError::StateDir { path: marker, source })?;
  info!(root = %dir.display(), "initialized project root");
  Ok(true)
}

/// Convert targets given relative to the working directory into local paths.
pub fn local_target_paths(options: &UpdateOptions) -> Result<Vec<String>, UpdateError> {
  options
    .targets
    .iter()
    .map(|target| {
      local_path(&options.root, &options.working_dir, Path::new(target))
        .ok_or_else(|| UpdateError::OutOfRoot(target.clone()))
    })
    .collect()
}

/// Load the manifest and build the graph for the requested targets.
///
/// Does not touch the file system beyond reading the manifest and walking
/// the source tree.
pub fn plan(options: &UpdateOptions) -> Result<(Manifest, BuildGraph), UpdateError> {
  let requested = local_target_paths(options)?;
  let manifest = Manifest::read_from_root(&options.root)?;
  debug!(
    templates = manifest.command_line_templates.len(),
    patterns = manifest.source_patterns.len(),
    rules = manifest.rules.len(),
    "loaded manifest"
  );

  let matches = resolve_all(&manifest.source_patterns, &options.root)?;
  let graph = BuildGraph::build(&manifest, &matches, &requested)?;
  Ok((manifest, graph))
}

/// Bring the requested targets up to date.
///
/// # Errors
///
/// Returns an error for manifest, pattern, graph and state directory
/// problems. Target failures are reported in [`UpdateResult::report`].
pub async fn update(options: &UpdateOptions) -> Result<UpdateResult, UpdateError> {
  info!(root = %options.root.display(), "updating");
  let (_manifest, graph) = plan(options)?;

  let state_dir = options.root.join(STATE_DIR);
  let depfile_dir = state_dir.join(DEPFILE_DIR);
  std::fs::create_dir_all(&depfile_dir).map_err(|source| UpdateError::StateDir {
    path: depfile_dir.clone(),
    source,
  })?;

  let mut store = SignatureStore::open(&state_dir)?;

  let report = execute(&graph, &mut store, &options.root, &options.execute).await;
  store.compact()?;

  Ok(UpdateResult {
    selected: graph.len(),
    report,
  })
}
