//! Resolving source patterns against the project tree.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{ResolveError, SourcePattern};
use crate::consts::STATE_DIR;
use crate::util::path::local_path;

/// A file matched by a source pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
  /// Local path of the file.
  pub path: String,
  /// Captured substrings, ordered by opening parenthesis.
  pub captures: Vec<String>,
}

/// Find every file under `root` matching `pattern`, sorted by path.
///
/// Only the pattern's literal directory prefix is walked. The state directory
/// is never descended into.
pub fn resolve_source(pattern: &SourcePattern, root: &Path) -> Result<Vec<Match>, ResolveError> {
  let base_dir = pattern.literal_dir();
  let base = if base_dir.is_empty() {
    root.to_path_buf()
  } else {
    root.join(&base_dir)
  };

  let mut matches = Vec::new();
  if !base.is_dir() {
    warn!(pattern = %pattern, "source pattern matched no files");
    return Ok(matches);
  }

  let walker = WalkDir::new(&base)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.depth() == 0 || e.file_name() != STATE_DIR);

  for entry in walker {
    let entry = entry.map_err(|e| ResolveError::Walk {
      path: base.display().to_string(),
      message: e.to_string(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }
    let Some(local) = local_path(root, root, entry.path()) else {
      continue;
    };
    if let Some(captures) = pattern.match_path(&local) {
      matches.push(Match { path: local, captures });
    }
  }

  // Walk order is per-directory; callers rely on a total order by path.
  matches.sort_by(|a, b| a.path.cmp(&b.path));

  if matches.is_empty() {
    warn!(pattern = %pattern, "source pattern matched no files");
  } else {
    debug!(pattern = %pattern, count = matches.len(), "resolved source pattern");
  }
  Ok(matches)
}

/// Resolve every pattern, keeping the manifest's order.
pub fn resolve_all(patterns: &[SourcePattern], root: &Path) -> Result<Vec<Vec<Match>>, ResolveError> {
  patterns.iter().map(|p| resolve_source(p, root)).collect()
}
