//! Signature store: what each target was last built from.
//!
//! # Storage Layout
//!
//! ```text
//! {root}/.upd/
//! ├── log          # one JSON record per line, later lines win
//! └── log.tmp      # compaction scratch, renamed over `log`
//! ```
//!
//! A record is appended as soon as its target succeeds, with a single write,
//! so an interrupted build keeps every record written before the interruption.
//! At the end of an invocation the log is compacted to one line per output.
//! Lines that do not parse are skipped with a warning; the affected targets
//! simply rebuild.

mod fingerprint;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use fingerprint::{Fingerprint, FingerprintCache};

use crate::consts::{LOG_FILE, LOG_TMP_FILE};
use crate::graph::Target;
use crate::util::hash::{ContentHash, HashError, Hashable};

/// The signature of one successful build of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
  /// Hash of the expanded command line.
  pub command: ContentHash,
  /// The output as the command left it.
  pub output: Fingerprint,
  /// Every input, explicit dependency and discovered dependency.
  pub dependencies: BTreeMap<String, Fingerprint>,
  /// Dependencies reported by the command's dependency file.
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub discovered: BTreeSet<String>,
}

/// One log line: the output path under `target`, then its record.
#[derive(Serialize, Deserialize)]
struct LogEntry {
  #[serde(rename = "target")]
  output: String,
  #[serde(flatten)]
  record: SignatureRecord,
}

/// Why a target has to be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
  NoRecord,
  CommandChanged,
  DependencyAdded(String),
  DependencyRemoved(String),
  DependencyChanged(String),
  DependencyMissing(String),
  OutputMissing,
  OutputModified,
}

impl std::fmt::Display for StaleReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      StaleReason::NoRecord => write!(f, "never built"),
      StaleReason::CommandChanged => write!(f, "command line changed"),
      StaleReason::DependencyAdded(p) => write!(f, "new dependency {}", p),
      StaleReason::DependencyRemoved(p) => write!(f, "dependency {} removed", p),
      StaleReason::DependencyChanged(p) => write!(f, "{} changed", p),
      StaleReason::DependencyMissing(p) => write!(f, "{} is missing", p),
      StaleReason::OutputMissing => write!(f, "output is missing"),
      StaleReason::OutputModified => write!(f, "output was modified"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
  Fresh,
  Stale(StaleReason),
}

/// Errors from the signature store.
#[derive(Debug, Error)]
pub enum SignatureError {
  #[error("failed to read signature log {}: {source}", .path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to write signature log {}: {source}", .path.display())]
  Write { path: PathBuf, source: io::Error },

  #[error("failed to inspect {}: {source}", .path.display())]
  Stat { path: PathBuf, source: io::Error },

  #[error("failed to serialize signature: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("corrupt signature log line {line}: {message}")]
  Corrupt { line: usize, message: String },

  #[error("command succeeded but did not produce {0}")]
  MissingOutput(String),

  #[error("dependency {0} disappeared while building")]
  MissingDependency(String),
}

/// Persistent map from output path to [`SignatureRecord`].
#[derive(Debug)]
pub struct SignatureStore {
  state_dir: PathBuf,
  records: BTreeMap<String, SignatureRecord>,
  writer: Option<File>,
}

impl SignatureStore {
  /// Open the store in `state_dir`, loading the existing log if any.
  pub fn open(state_dir: &Path) -> Result<Self, SignatureError> {
    let path = state_dir.join(LOG_FILE);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
      Err(source) => return Err(SignatureError::Read { path, source }),
    };

    let mut records = BTreeMap::new();
    for (ix, line) in content.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      match serde_json::from_str::<LogEntry>(line) {
        Ok(entry) => {
          records.insert(entry.output, entry.record);
        }
        Err(e) => {
          let err = SignatureError::Corrupt {
            line: ix + 1,
            message: e.to_string(),
          };
          warn!(error = %err, "ignoring signature log entry");
        }
      }
    }
    debug!(records = records.len(), "opened signature store");

    Ok(Self {
      state_dir: state_dir.to_path_buf(),
      records,
      writer: None,
    })
  }

  pub fn get(&self, output: &str) -> Option<&SignatureRecord> {
    self.records.get(output)
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Decide whether `target` must be rebuilt.
  ///
  /// The paths checked are the target's inputs and explicit dependencies plus
  /// whatever its last dependency file reported.
  pub fn is_stale(&self, target: &Target, cache: &mut FingerprintCache) -> Result<Staleness, SignatureError> {
    let Some(record) = self.records.get(&target.output) else {
      return Ok(Staleness::Stale(StaleReason::NoRecord));
    };

    if target.command_line.content_hash()? != record.command {
      return Ok(Staleness::Stale(StaleReason::CommandChanged));
    }

    match cache.fingerprint(&target.output, Some(&record.output))? {
      None => return Ok(Staleness::Stale(StaleReason::OutputMissing)),
      Some(current) if !current.same_content(&record.output) => {
        return Ok(Staleness::Stale(StaleReason::OutputModified));
      }
      Some(_) => {}
    }

    let mut check: BTreeSet<&str> = target.fingerprint_paths();
    check.extend(record.discovered.iter().map(String::as_str));

    for path in &check {
      if !record.dependencies.contains_key(*path) {
        return Ok(Staleness::Stale(StaleReason::DependencyAdded(path.to_string())));
      }
    }
    for path in record.dependencies.keys() {
      if !check.contains(path.as_str()) {
        return Ok(Staleness::Stale(StaleReason::DependencyRemoved(path.clone())));
      }
    }

    for (path, recorded) in &record.dependencies {
      match cache.fingerprint(path, Some(recorded))? {
        None => return Ok(Staleness::Stale(StaleReason::DependencyMissing(path.clone()))),
        Some(current) if !current.same_content(recorded) => {
          return Ok(Staleness::Stale(StaleReason::DependencyChanged(path.clone())));
        }
        Some(_) => {}
      }
    }

    Ok(Staleness::Fresh)
  }

  /// Record a successful build of `target`.
  ///
  /// Must only be called after the command succeeded. The record is appended
  /// to the log with a single write before the in-memory map is updated.
  pub fn commit(
    &mut self,
    target: &Target,
    discovered: &BTreeSet<String>,
    cache: &mut FingerprintCache,
  ) -> Result<(), SignatureError> {
    cache.invalidate(&target.output);
    let output = cache
      .fingerprint(&target.output, None)?
      .ok_or_else(|| SignatureError::MissingOutput(target.output.clone()))?;

    let previous = self.records.get(&target.output);
    let mut dependencies = BTreeMap::new();
    let mut kept_discovered = BTreeSet::new();

    for path in target.fingerprint_paths() {
      let recorded = previous.and_then(|r| r.dependencies.get(path));
      let fingerprint = cache
        .fingerprint(path, recorded)?
        .ok_or_else(|| SignatureError::MissingDependency(path.to_string()))?;
      dependencies.insert(path.to_string(), fingerprint);
    }
    for path in discovered {
      if dependencies.contains_key(path) {
        continue;
      }
      let recorded = previous.and_then(|r| r.dependencies.get(path));
      match cache.fingerprint(path, recorded)? {
        Some(fingerprint) => {
          dependencies.insert(path.clone(), fingerprint);
          kept_discovered.insert(path.clone());
        }
        None => warn!(target_path = %target.output, dependency = %path, "discovered dependency does not exist"),
      }
    }

    let record = SignatureRecord {
      command: target.command_line.content_hash()?,
      output,
      dependencies,
      discovered: kept_discovered,
    };

    let mut line = serde_json::to_string(&LogEntry {
      output: target.output.clone(),
      record: record.clone(),
    })?;
    line.push('\n');
    self.append(line.as_bytes())?;

    self.records.insert(target.output.clone(), record);
    Ok(())
  }

  fn append(&mut self, bytes: &[u8]) -> Result<(), SignatureError> {
    let path = self.state_dir.join(LOG_FILE);
    let write_err = |source: io::Error| SignatureError::Write {
      path: path.clone(),
      source,
    };

    if self.writer.is_none() {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(write_err)?;
      self.writer = Some(file);
    }
    if let Some(writer) = self.writer.as_mut() {
      writer.write_all(bytes).map_err(write_err)?;
      writer.flush().map_err(write_err)?;
    }
    Ok(())
  }

  /// Rewrite the log with exactly one line per output.
  ///
  /// The new log is written next to the old one and renamed over it, so a
  /// crash leaves either the old or the new log in place.
  pub fn compact(&mut self) -> Result<(), SignatureError> {
    self.writer = None;

    let path = self.state_dir.join(LOG_FILE);
    let temp_path = self.state_dir.join(LOG_TMP_FILE);

    let mut content = String::new();
    for (output, record) in &self.records {
      content.push_str(&serde_json::to_string(&LogEntry {
        output: output.clone(),
        record: record.clone(),
      })?);
      content.push('\n');
    }

    fs::write(&temp_path, &content).map_err(|source| SignatureError::Write {
      path: temp_path.clone(),
      source,
    })?;
    fs::rename(&temp_path, &path).map_err(|source| SignatureError::Write { path, source })?;

    debug!(records = self.records.len(), "compacted signature log");
    Ok(())
  }
}
