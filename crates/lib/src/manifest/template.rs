//! Command line templates and the command lines expanded from them.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::util::hash::Hashable;

/// One argument slot of a template.
///
/// The set of variables is closed: a template can only ask for the input
/// files, the output file or the dependency file of the target it runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSlot {
  Literal(String),
  /// Expands to one argument per input file, in input order.
  InputFiles,
  OutputFile,
  DependencyFile,
}

impl TemplateSlot {
  /// Parse a variable name as written in the manifest.
  pub fn variable(name: &str) -> Option<Self> {
    match name {
      "input_files" => Some(Self::InputFiles),
      "output_file" => Some(Self::OutputFile),
      "dependency_file" => Some(Self::DependencyFile),
      _ => None,
    }
  }
}

/// A parameterized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLineTemplate {
  pub binary_path: String,
  pub slots: Vec<TemplateSlot>,
  /// Variables set on top of the parent environment.
  pub environment: BTreeMap<String, String>,
}

/// Values substituted into a template for one target.
#[derive(Debug, Clone, Copy)]
pub struct ReifyParams<'a> {
  pub input_files: &'a [String],
  pub output_file: &'a str,
  pub dependency_file: &'a str,
}

impl CommandLineTemplate {
  /// Whether the command is expected to write a dependency file.
  pub fn declares_dependency_file(&self) -> bool {
    self.slots.iter().any(|s| matches!(s, TemplateSlot::DependencyFile))
  }

  /// Expand the template into a concrete command line.
  pub fn reify(&self, params: ReifyParams<'_>) -> CommandLine {
    let mut args = Vec::new();
    for slot in &self.slots {
      match slot {
        TemplateSlot::Literal(s) => args.push(s.clone()),
        TemplateSlot::InputFiles => args.extend(params.input_files.iter().cloned()),
        TemplateSlot::OutputFile => args.push(params.output_file.to_string()),
        TemplateSlot::DependencyFile => args.push(params.dependency_file.to_string()),
      }
    }
    CommandLine {
      binary_path: self.binary_path.clone(),
      args,
      environment: self.environment.clone(),
    }
  }
}

/// A fully expanded command line.
///
/// Its content hash is what the signature store records, so any change to the
/// binary, an argument or the environment overrides makes the target stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
  pub binary_path: String,
  pub args: Vec<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub environment: BTreeMap<String, String>,
}

impl Hashable for CommandLine {}

impl std::fmt::Display for CommandLine {
  /// Formats the command line as it could be typed into a POSIX shell.
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    for (key, value) in &self.environment {
      write!(f, "{}={} ", key, shell_escape(value))?;
    }
    write!(f, "{}", shell_escape(&self.binary_path))?;
    for arg in &self.args {
      write!(f, " {}", shell_escape(arg))?;
    }
    Ok(())
  }
}

/// Quote a word for a POSIX shell, leaving plain words untouched.
pub fn shell_escape(word: &str) -> Cow<'_, str> {
  let plain = !word.is_empty()
    && word
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ',' | ':' | '=' | '@' | '%'));
  if plain {
    Cow::Borrowed(word)
  } else {
    Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
  }
}
