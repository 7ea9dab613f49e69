//! File fingerprints and the per-invocation fingerprint cache.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use super::SignatureError;
use crate::util::hash::{ContentHash, hash_file};

/// What is known about a file's content at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
  pub size: u64,
  /// Modification time, nanoseconds since the Unix epoch.
  pub modified: u64,
  pub digest: ContentHash,
}

impl Fingerprint {
  /// Whether two fingerprints describe the same content.
  pub fn same_content(&self, other: &Fingerprint) -> bool {
    self.size == other.size && self.digest == other.digest
  }
}

/// Memoizes fingerprints for the duration of one invocation.
///
/// Content is only hashed when a file's size or modification time differs
/// from the fingerprint it is compared against.
#[derive(Debug)]
pub struct FingerprintCache {
  root: PathBuf,
  entries: HashMap<String, Option<Fingerprint>>,
}

impl FingerprintCache {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
      entries: HashMap::new(),
    }
  }

  /// Current fingerprint of a local path, or `None` if the file does not exist.
  ///
  /// When `previous` has the same size and modification time as the file on
  /// disk, its digest is reused instead of reading the file.
  pub fn fingerprint(&mut self, local: &str, previous: Option<&Fingerprint>) -> Result<Option<Fingerprint>, SignatureError> {
    if let Some(cached) = self.entries.get(local) {
      return Ok(cached.clone());
    }

    let path = self.root.join(local);
    let metadata = match fs::metadata(&path) {
      Ok(metadata) => metadata,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        self.entries.insert(local.to_string(), None);
        return Ok(None);
      }
      Err(source) => return Err(SignatureError::Stat { path, source }),
    };

    let size = metadata.len();
    let modified = metadata
      .modified()
      .ok()
      .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
      .map(|d| d.as_nanos() as u64)
      .unwrap_or(0);

    let digest = match previous {
      Some(prev) if prev.size == size && prev.modified == modified => prev.digest.clone(),
      _ => hash_file(&path)?,
    };

    let fingerprint = Fingerprint { size, modified, digest };
    self.entries.insert(local.to_string(), Some(fingerprint.clone()));
    Ok(Some(fingerprint))
  }

  /// Forget what is known about a path, e.g. before a command rewrites it.
  pub fn invalidate(&mut self, local: &str) {
    self.entries.remove(local);
  }
}
