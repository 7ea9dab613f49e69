//! Local paths.
//!
//! Everything the engine stores or compares is a *local* path: relative to the
//! project root, `/`-separated, without `.` or `..` components. Keeping the
//! root out of stored paths means a project can be moved without invalidating
//! its signature log.

use std::path::{Component, Path, PathBuf};

/// Normalizes a `/`-separated relative path.
///
/// Returns `None` for absolute paths, for paths that climb above their
/// starting point, and for paths that normalize to nothing.
pub fn normalize(path: &str) -> Option<String> {
  if path.starts_with('/') {
    return None;
  }
  let mut parts: Vec<&str> = Vec::new();
  for part in path.split('/') {
    match part {
      "" | "." => {}
      ".." => {
        parts.pop()?;
      }
      other => parts.push(other),
    }
  }
  if parts.is_empty() { None } else { Some(parts.join("/")) }
}

/// Converts `path` (absolute, or relative to `base`) into a path local to
/// `root`.
///
/// Returns `None` when the path resolves outside of `root` or to the root
/// itself.
pub fn local_path(root: &Path, base: &Path, path: &Path) -> Option<String> {
  let joined = if path.is_absolute() {
    path.to_path_buf()
  } else {
    base.join(path)
  };
  let normalized = lexical_normalize(&joined)?;
  let root = lexical_normalize(root)?;
  let relative = normalized.strip_prefix(&root).ok()?;

  let parts: Vec<String> = relative
    .components()
    .filter_map(|c| match c {
      Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
      _ => None,
    })
    .collect();
  if parts.is_empty() { None } else { Some(parts.join("/")) }
}

/// Returns the parent directory of a local path, if it has one.
pub fn parent(local: &str) -> Option<&str> {
  local.rsplit_once('/').map(|(dir, _)| dir)
}

fn lexical_normalize(path: &Path) -> Option<PathBuf> {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          return None;
        }
      }
      Component::Normal(s) => out.push(s),
    }
  }
  Some(out)
}
