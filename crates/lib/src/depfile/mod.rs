//! Makefile-style dependency files.
//!
//! Compilers write these to report the headers a translation unit actually
//! read (`cc -MMD -MF out.d`). The grammar accepted here is the subset such
//! tools produce:
//!
//! ```text
//! dist/main.o: src/main.c src/util.h \
//!   src/path\ with\ spaces.h
//! src/util.h:
//! ```
//!
//! - whitespace separates words, `:` separates targets from dependencies
//! - a newline ends a record; `\` followed by a newline continues it
//! - `\` makes the next character part of the word (`\ `, `\:`, `\\`)

use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;

use thiserror::Error;

use crate::util::path::local_path;

/// One `targets: dependencies` record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepFileEntry {
  pub targets: Vec<String>,
  pub dependencies: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DepfileError {
  #[error("invalid dependency file syntax at line {line}: {message}")]
  InvalidSyntax { line: usize, message: String },

  #[error("failed to read dependency file {}: {source}", .path.display())]
  Read { path: PathBuf, source: std::io::Error },
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
  Word(String),
  Colon,
  Newline,
}

struct Tokenizer<'a> {
  chars: Peekable<Chars<'a>>,
  line: usize,
  newline_pending: bool,
}

impl<'a> Tokenizer<'a> {
  fn new(text: &'a str) -> Self {
    Self {
      chars: text.chars().peekable(),
      line: 1,
      newline_pending: false,
    }
  }

  fn syntax_error(&self, message: &str) -> DepfileError {
    DepfileError::InvalidSyntax {
      line: self.line,
      message: message.to_string(),
    }
  }

  /// Whether the input continues with `\` + newline (optionally CRLF).
  fn continuation_len(&self) -> Option<usize> {
    let mut lookahead = self.chars.clone();
    if lookahead.next() != Some('\\') {
      return None;
    }
    match lookahead.next() {
      Some('\n') => Some(2),
      Some('\r') if lookahead.next() == Some('\n') => Some(3),
      _ => None,
    }
  }

  fn next_token(&mut self) -> Result<Option<Token>, DepfileError> {
    if self.newline_pending {
      self.line += 1;
      self.newline_pending = false;
    }

    loop {
      if let Some(len) = self.continuation_len() {
        for _ in 0..len {
          self.chars.next();
        }
        self.line += 1;
        continue;
      }
      match self.chars.peek() {
        None => return Ok(None),
        Some(' ' | '\t' | '\r') => {
          self.chars.next();
        }
        Some(':') => {
          self.chars.next();
          return Ok(Some(Token::Colon));
        }
        Some('\n') => {
          self.chars.next();
          self.newline_pending = true;
          return Ok(Some(Token::Newline));
        }
        Some(_) => break,
      }
    }

    let mut word = String::new();
    while let Some(&c) = self.chars.peek() {
      match c {
        ' ' | '\t' | '\r' | '\n' | ':' => break,
        '\\' => {
          if self.continuation_len().is_some() {
            break;
          }
          self.chars.next();
          match self.chars.next() {
            Some(escaped) => word.push(escaped),
            None => return Err(self.syntax_error("escape character at end of input")),
          }
        }
        _ => {
          word.push(c);
          self.chars.next();
        }
      }
    }
    Ok(Some(Token::Word(word)))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  ReadTarget,
  ReadDependency,
}

/// Parse the contents of a dependency file.
pub fn parse(bytes: &[u8]) -> Result<Vec<DepFileEntry>, DepfileError> {
  let text = String::from_utf8_lossy(bytes);
  let mut tokens = Tokenizer::new(&text);
  let mut entries = Vec::new();
  let mut current = DepFileEntry::default();
  let mut state = State::ReadTarget;

  loop {
    let token = tokens.next_token()?;
    let at_end = token.is_none();
    match (state, token) {
      (State::ReadTarget, Some(Token::Word(word))) => current.targets.push(word),
      (State::ReadTarget, Some(Token::Colon)) => {
        if current.targets.is_empty() {
          return Err(tokens.syntax_error("`:` before any target"));
        }
        state = State::ReadDependency;
      }
      (State::ReadTarget, Some(Token::Newline) | None) => {
        if !current.targets.is_empty() {
          return Err(tokens.syntax_error("record has no `:`"));
        }
      }
      (State::ReadDependency, Some(Token::Word(word))) => current.dependencies.push(word),
      (State::ReadDependency, Some(Token::Colon)) => {
        return Err(tokens.syntax_error("unexpected second `:` in record"));
      }
      (State::ReadDependency, Some(Token::Newline) | None) => {
        entries.push(std::mem::take(&mut current));
        state = State::ReadTarget;
      }
    }
    if at_end {
      break;
    }
  }

  Ok(entries)
}

/// Read and parse a dependency file. A missing file yields `None`.
pub fn read(path: &Path) -> Result<Option<Vec<DepFileEntry>>, DepfileError> {
  match std::fs::read(path) {
    Ok(bytes) => parse(&bytes).map(Some),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
    Err(source) => Err(DepfileError::Read {
      path: path.to_path_buf(),
      source,
    }),
  }
}

/// Dependencies of every record that names `output` among its targets.
///
/// Targets may be written relative to `root` or as absolute paths under it.
/// Records about other targets are ignored.
pub fn dependencies_of<'a>(entries: &'a [DepFileEntry], root: &Path, output: &str) -> Vec<&'a str> {
  entries
    .iter()
    .filter(|e| {
      e.targets
        .iter()
        .any(|t| local_path(root, root, Path::new(t)).as_deref() == Some(output))
    })
    .flat_map(|e| e.dependencies.iter().map(String::as_str))
    .collect()
}
