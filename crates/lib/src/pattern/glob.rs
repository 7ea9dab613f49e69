//! Source patterns: globs with capture groups.
//!
//! # Syntax
//!
//! - `*` - any run of characters within one path component
//! - `?` - exactly one character within a path component
//! - `**/` - zero or more whole directory components; `**` must start a component
//! - `**` at the end of the pattern (or of a group) - the rest of the path
//! - `(` ... `)` - capture group, numbered by opening parenthesis
//! - `\` - the next character is literal
//!
//! # Example
//!
//! ```
//! use upd_lib::pattern::SourcePattern;
//!
//! let pattern = SourcePattern::parse("src/(**/*).c").unwrap();
//! assert_eq!(pattern.match_path("src/net/tcp.c"), Some(vec!["net/tcp".to_string()]));
//! assert_eq!(pattern.match_path("src/net/tcp.h"), None);
//! ```

use super::PatternError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
  Literal(char),
  Star,
  Question,
  AnyDirs,
  AnyPath,
  Open(usize),
  Close(usize),
}

/// A parsed source pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePattern {
  text: String,
  tokens: Vec<Token>,
  group_count: usize,
}

impl SourcePattern {
  /// Parse a glob pattern.
  pub fn parse(input: &str) -> Result<Self, PatternError> {
    let invalid = |position: usize, message: &str| PatternError::Invalid {
      pattern: input.to_string(),
      position,
      message: message.to_string(),
    };

    if input.is_empty() {
      return Err(invalid(0, "pattern is empty"));
    }
    if input.starts_with('/') {
      return Err(invalid(0, "pattern must be relative to the project root"));
    }

    let mut tokens = Vec::new();
    let mut open_groups: Vec<usize> = Vec::new();
    let mut group_count = 0;
    let mut chars = input.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
      match ch {
        '\\' => match chars.next() {
          Some((_, escaped)) => tokens.push(Token::Literal(escaped)),
          None => return Err(invalid(pos, "escape character at end of pattern")),
        },
        '*' => {
          if let Some((_, '*')) = chars.peek() {
            if !at_component_start(&tokens) {
              return Err(invalid(pos, "`**` must start a path component"));
            }
            chars.next();
            match chars.peek() {
              Some((_, '/')) => {
                chars.next();
                tokens.push(Token::AnyDirs);
              }
              None | Some((_, ')')) => tokens.push(Token::AnyPath),
              Some(_) => return Err(invalid(pos, "`**` must be followed by `/` or end the pattern")),
            }
          } else {
            tokens.push(Token::Star);
          }
        }
        '?' => tokens.push(Token::Question),
        '(' => {
          open_groups.push(group_count);
          tokens.push(Token::Open(group_count));
          group_count += 1;
        }
        ')' => match open_groups.pop() {
          Some(group) => tokens.push(Token::Close(group)),
          None => return Err(invalid(pos, "unmatched `)`")),
        },
        other => tokens.push(Token::Literal(other)),
      }
    }

    if !open_groups.is_empty() {
      return Err(invalid(input.len(), "unclosed `(`"));
    }

    Ok(Self {
      text: input.to_string(),
      tokens,
      group_count,
    })
  }

  /// The pattern as written in the manifest.
  pub fn as_str(&self) -> &str {
    &self.text
  }

  /// Number of capture groups.
  pub fn group_count(&self) -> usize {
    self.group_count
  }

  /// The directory every match must live under, or `""` for the root.
  ///
  /// This is the longest run of literal components before the first
  /// wildcard, so that resolution only walks the part of the tree that can
  /// possibly match.
  pub fn literal_dir(&self) -> String {
    let mut prefix = String::new();
    for token in &self.tokens {
      match token {
        Token::Literal(c) => prefix.push(*c),
        Token::Open(_) | Token::Close(_) => {}
        _ => break,
      }
    }
    match prefix.rfind('/') {
      Some(ix) => prefix[..ix].to_string(),
      None => String::new(),
    }
  }

  /// Match a local path, returning the captured substrings on success.
  ///
  /// Wildcards are greedy and backtrack, so the result for a given pattern
  /// and path is always the same.
  pub fn match_path(&self, path: &str) -> Option<Vec<String>> {
    let chars: Vec<char> = path.chars().collect();
    let mut matcher = Matcher {
      tokens: &self.tokens,
      path: &chars,
      starts: vec![0; self.group_count],
      ends: vec![0; self.group_count],
    };
    if !matcher.match_from(0, 0) {
      return None;
    }
    Some(
      matcher
        .starts
        .iter()
        .zip(&matcher.ends)
        .map(|(&start, &end)| chars[start..end].iter().collect())
        .collect(),
    )
  }
}

impl std::fmt::Display for SourcePattern {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.text)
  }
}

struct Matcher<'a> {
  tokens: &'a [Token],
  path: &'a [char],
  starts: Vec<usize>,
  ends: Vec<usize>,
}

impl Matcher<'_> {
  fn match_from(&mut self, ti: usize, pi: usize) -> bool {
    let tokens = self.tokens;
    let Some(token) = tokens.get(ti) else {
      return pi == self.path.len();
    };

    match token {
      Token::Literal(c) => self.path.get(pi) == Some(c) && self.match_from(ti + 1, pi + 1),
      Token::Question => matches!(self.path.get(pi), Some(c) if *c != '/') && self.match_from(ti + 1, pi + 1),
      Token::Star => {
        let run = self.path[pi..].iter().take_while(|c| **c != '/').count();
        (0..=run).rev().any(|len| self.match_from(ti + 1, pi + len))
      }
      Token::AnyDirs => {
        let mut candidates = vec![pi];
        candidates.extend((pi..self.path.len()).filter(|&i| self.path[i] == '/').map(|i| i + 1));
        candidates.into_iter().rev().any(|next| self.match_from(ti + 1, next))
      }
      Token::AnyPath => (pi..=self.path.len()).rev().any(|next| self.match_from(ti + 1, next)),
      Token::Open(group) => {
        let group = *group;
        let saved = self.starts[group];
        self.starts[group] = pi;
        if self.match_from(ti + 1, pi) {
          return true;
        }
        self.starts[group] = saved;
        false
      }
      Token::Close(group) => {
        let group = *group;
        let saved = self.ends[group];
        self.ends[group] = pi;
        if self.match_from(ti + 1, pi) {
          return true;
        }
        self.ends[group] = saved;
        false
      }
    }
  }
}

/// Whether the next token begins a path component, looking through any
/// groups opened right before it.
fn at_component_start(tokens: &[Token]) -> bool {
  match tokens.iter().rev().find(|t| !matches!(t, Token::Open(_))) {
    None | Some(Token::Literal('/')) | Some(Token::AnyDirs) => true,
    Some(_) => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn captures(pattern: &str, path: &str) -> Option<Vec<String>> {
    SourcePattern::parse(pattern).unwrap().match_path(path)
  }

  #[test]
  fn literal_pattern() {
    assert_eq!(captures("src/main.c", "src/main.c"), Some(vec![]));
    assert_eq!(captures("src/main.c", "src/main.h"), None);
  }

  #[test]
  fn star_stays_within_component() {
    assert_eq!(captures("src/(*).c", "src/a.c"), Some(vec!["a".to_string()]));
    assert_eq!(captures("src/(*).c", "src/sub/a.c"), None);
  }

  #[test]
  fn question_matches_one_char() {
    assert_eq!(captures("v?.txt", "v1.txt"), Some(vec![]));
    assert_eq!(captures("v?.txt", "v10.txt"), None);
    assert_eq!(captures("a?b", "a/b"), None);
  }

  #[test]
  fn any_dirs_matches_zero_or_more_components() {
    let pattern = SourcePattern::parse("src/(**/*).in").unwrap();
    assert_eq!(pattern.match_path("src/top.in"), Some(vec!["top".to_string()]));
    assert_eq!(pattern.match_path("src/a/b/deep.in"), Some(vec!["a/b/deep".to_string()]));
    assert_eq!(pattern.match_path("other/top.in"), None);
  }

  #[test]
  fn trailing_any_path() {
    assert_eq!(captures("assets/(**)", "assets/img/logo.png"), Some(vec!["img/logo.png".to_string()]));
  }

  #[test]
  fn nested_groups_numbered_by_opening_paren() {
    assert_eq!(
      captures("((*)/(*)).c", "net/tcp.c"),
      Some(vec!["net/tcp".to_string(), "net".to_string(), "tcp".to_string()])
    );
  }

  #[test]
  fn star_is_greedy() {
    assert_eq!(
      captures("(*).(*)", "archive.tar.gz"),
      Some(vec!["archive.tar".to_string(), "gz".to_string()])
    );
  }

  #[test]
  fn escapes_are_literal() {
    assert_eq!(captures(r"\(*\).c", "(x).c"), Some(vec![]));
    assert_eq!(captures(r"a\*b", "a*b"), Some(vec![]));
    assert_eq!(captures(r"a\*b", "axb"), None);
  }

  #[test]
  fn literal_dir_prefix() {
    assert_eq!(SourcePattern::parse("src/lib/(*).c").unwrap().literal_dir(), "src/lib");
    assert_eq!(SourcePattern::parse("(src)/*.c").unwrap().literal_dir(), "src");
    assert_eq!(SourcePattern::parse("*.c").unwrap().literal_dir(), "");
    assert_eq!(SourcePattern::parse("src/**/*.c").unwrap().literal_dir(), "src");
  }

  #[test]
  fn any_dirs_must_start_a_component() {
    let err = SourcePattern::parse("a**/b").unwrap_err();
    assert!(matches!(err, PatternError::Invalid { position: 1, .. }));
    assert!(SourcePattern::parse("src/x**").is_err());
    assert!(SourcePattern::parse("(a)**/b").is_err());
    assert!(SourcePattern::parse("**/x").is_ok());
    assert!(SourcePattern::parse("src/(**/*).c").is_ok());
    assert!(SourcePattern::parse("((**))").is_ok());
    assert!(SourcePattern::parse("**/**/x").is_ok());
  }

  #[test]
  fn group_count() {
    assert_eq!(SourcePattern::parse("(a)/(b)/c").unwrap().group_count(), 2);
  }

  #[test]
  fn error_unbalanced_parens() {
    assert!(matches!(SourcePattern::parse("(a"), Err(PatternError::Invalid { .. })));
    assert!(matches!(SourcePattern::parse("a)"), Err(PatternError::Invalid { position: 1, .. })));
  }

  #[test]
  fn error_trailing_escape() {
    assert!(SourcePattern::parse("abc\\").is_err());
  }

  #[test]
  fn error_double_star_inside_component() {
    assert!(SourcePattern::parse("src/**.c").is_err());
  }

  #[test]
  fn error_absolute_or_empty() {
    assert!(SourcePattern::parse("/etc/*").is_err());
    assert!(SourcePattern::parse("").is_err());
  }
}
