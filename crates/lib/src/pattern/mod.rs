//! Pattern resolution.
//!
//! Source patterns select files from the project tree and capture parts of
//! their paths; output patterns turn those captures into output paths.

mod glob;
mod resolve;
mod substitution;

pub use glob::SourcePattern;
pub use resolve::{Match, resolve_all, resolve_source};
pub use substitution::{Expanded, OutputPattern, Segment};

use thiserror::Error;

/// Errors from parsing a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
  #[error("invalid pattern '{pattern}' at position {position}: {message}")]
  Invalid {
    pattern: String,
    position: usize,
    message: String,
  },
}

/// An output pattern referenced a capture its input does not provide.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("output pattern '{pattern}' uses ${placeholder} but only {available} capture(s) are available")]
pub struct CaptureArityError {
  pub pattern: String,
  pub placeholder: usize,
  pub available: usize,
}

/// Errors from resolving patterns against the file system.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("failed to walk {path}: {message}")]
  Walk { path: String, message: String },
}
