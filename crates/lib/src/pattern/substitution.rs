//! Output patterns: substitution strings with capture placeholders.
//!
//! # Syntax
//!
//! - `$N` - the N-th capture (1-based) of the input the output is built from
//! - `(` ... `)` - capture group; the text it expands to becomes a capture
//!   for rules consuming this rule's outputs
//! - `\` - the next character is literal
//!
//! # Example
//!
//! ```
//! use upd_lib::pattern::OutputPattern;
//!
//! let pattern = OutputPattern::parse("dist/($1).o").unwrap();
//! let expanded = pattern.expand(&["net/tcp".to_string()]).unwrap();
//! assert_eq!(expanded.path, "dist/net/tcp.o");
//! assert_eq!(expanded.captures, vec!["net/tcp".to_string()]);
//! ```

use super::{CaptureArityError, PatternError};

/// A segment of a parsed output pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text.
  Literal(String),

  /// Zero-based index of an input capture.
  Placeholder(usize),
}

/// A parsed output pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
  text: String,
  segments: Vec<Segment>,
  /// Capture groups as half-open segment ranges.
  groups: Vec<(usize, usize)>,
}

/// The result of expanding an output pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expanded {
  pub path: String,
  pub captures: Vec<String>,
}

impl OutputPattern {
  pub fn parse(input: &str) -> Result<Self, PatternError> {
    let invalid = |position: usize, message: &str| PatternError::Invalid {
      pattern: input.to_string(),
      position,
      message: message.to_string(),
    };

    let mut segments = Vec::new();
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut open_groups: Vec<usize> = Vec::new();
    let mut literal = String::new();
    let mut chars = input.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
      match ch {
        '(' | ')' | '$' if !literal.is_empty() => {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        _ => {}
      }

      match ch {
        '(' => {
          open_groups.push(groups.len());
          groups.push((segments.len(), segments.len()));
        }
        ')' => match open_groups.pop() {
          Some(group) => groups[group].1 = segments.len(),
          None => return Err(invalid(pos, "unmatched `)`")),
        },
        '$' => {
          let mut digits = String::new();
          while let Some((_, d)) = chars.peek().filter(|(_, d)| d.is_ascii_digit()) {
            digits.push(*d);
            chars.next();
          }
          let index: usize = digits
            .parse()
            .map_err(|_| invalid(pos, "`$` must be followed by a capture number"))?;
          if index == 0 {
            return Err(invalid(pos, "capture numbers start at 1"));
          }
          segments.push(Segment::Placeholder(index - 1));
        }
        '\\' => match chars.next() {
          Some((_, escaped)) => literal.push(escaped),
          None => return Err(invalid(pos, "escape character at end of pattern")),
        },
        other => literal.push(other),
      }
    }

    if !open_groups.is_empty() {
      return Err(invalid(input.len(), "unclosed `(`"));
    }
    if !literal.is_empty() {
      segments.push(Segment::Literal(literal));
    }

    Ok(Self {
      text: input.to_string(),
      segments,
      groups,
    })
  }

  pub fn as_str(&self) -> &str {
    &self.text
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// Number of captures this pattern defines for downstream rules.
  pub fn group_count(&self) -> usize {
    self.groups.len()
  }

  /// Number of input captures the pattern needs (highest placeholder).
  pub fn required_captures(&self) -> usize {
    self
      .segments
      .iter()
      .filter_map(|s| match s {
        Segment::Placeholder(ix) => Some(ix + 1),
        Segment::Literal(_) => None,
      })
      .max()
      .unwrap_or(0)
  }

  /// Substitute `captures` into the pattern.
  pub fn expand(&self, captures: &[String]) -> Result<Expanded, CaptureArityError> {
    let mut path = String::new();
    let mut offsets = Vec::with_capacity(self.segments.len() + 1);

    for segment in &self.segments {
      offsets.push(path.len());
      match segment {
        Segment::Literal(s) => path.push_str(s),
        Segment::Placeholder(ix) => {
          let value = captures.get(*ix).ok_or_else(|| CaptureArityError {
            pattern: self.text.clone(),
            placeholder: ix + 1,
            available: captures.len(),
          })?;
          path.push_str(value);
        }
      }
    }
    offsets.push(path.len());

    let captures = self
      .groups
      .iter()
      .map(|&(start, end)| path[offsets[start]..offsets[end]].to_string())
      .collect();

    Ok(Expanded { path, captures })
  }
}

impl std::fmt::Display for OutputPattern {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.text)
  }
}
