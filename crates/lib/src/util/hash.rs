//! Hashing utilities for change detection.
//!
//! This module provides:
//! - `ContentHash`: A full 64-character SHA-256 hash
//! - `Hashable`: Hash of any serializable value (used for command lines)
//! - `hash_file()`: Single file hashing
//! - `hash_bytes()`: Arbitrary byte hashing

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::HASH_BUFFER_SIZE;

/// A full 64-character SHA256 hash.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error during hashing.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },

  #[error("failed to serialize value: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// Values whose identity is the hash of their JSON serialization.
///
/// Field order is fixed by the struct definition, so equal values always
/// produce equal hashes.
pub trait Hashable: Serialize {
  fn content_hash(&self) -> Result<ContentHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    Ok(hash_bytes(serialized.as_bytes()))
  }
}

/// Hash a file's contents.
///
/// Returns the full 64-character SHA256 hash of the file.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let mut file = fs::File::open(path).map_err(|e| HashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  })?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; HASH_BUFFER_SIZE];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(|e| HashError::ReadFile {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}
