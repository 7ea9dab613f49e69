//! Manifest types.
//!
//! # Format
//!
//! ```json
//! {
//!   "command_line_templates": [
//!     {
//!       "binary_path": "cc",
//!       "arguments": [
//!         { "literals": ["-c"], "variables": ["input_files"] },
//!         { "literals": ["-o"], "variables": ["output_file"] },
//!         { "literals": ["-MMD", "-MF"], "variables": ["dependency_file"] }
//!       ]
//!     }
//!   ],
//!   "source_patterns": ["src/(**/*).c"],
//!   "rules": [
//!     {
//!       "command_line_ix": 0,
//!       "inputs": [{ "source_ix": 0 }],
//!       "output": "dist/($1).o"
//!     }
//!   ]
//! }
//! ```
//!
//! Each argument segment contributes its literals first, then its variables.
//! Rules reference source patterns and other rules by index; a rule consuming
//! another rule sees the captures defined by that rule's output groups.
//!
//! # Validation
//!
//! [`Manifest::load`] rejects anything the later phases could trip over:
//! out-of-range indices, unknown variables, malformed patterns, rules without
//! inputs, and output placeholders that an input cannot satisfy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::template::{CommandLineTemplate, TemplateSlot};
use crate::consts::MANIFEST_FILE;
use crate::pattern::{CaptureArityError, OutputPattern, PatternError, SourcePattern};

/// Reference from a rule to the paths of a source pattern or another rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputRef {
  #[serde(rename = "source_ix")]
  Source(usize),
  #[serde(rename = "rule_ix")]
  Rule(usize),
}

impl std::fmt::Display for InputRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      InputRef::Source(ix) => write!(f, "source #{}", ix),
      InputRef::Rule(ix) => write!(f, "rule #{}", ix),
    }
  }
}

/// A rule: how to produce outputs from matched inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
  pub command_line_ix: usize,
  pub inputs: Vec<InputRef>,
  pub output: OutputPattern,
  /// Paths that must be built first and whose changes make targets stale.
  pub dependencies: Vec<InputRef>,
  /// Paths that must be built first but do not affect staleness.
  pub order_only_dependencies: Vec<InputRef>,
}

/// The validated manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
  pub command_line_templates: Vec<CommandLineTemplate>,
  pub source_patterns: Vec<SourcePattern>,
  pub rules: Vec<Rule>,
}

/// Errors from reading or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("no manifest found at {}", .path.display())]
  Missing { path: PathBuf },

  #[error("failed to read manifest {}: {source}", .path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("invalid manifest JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("rule #{rule_ix} references unknown command line template #{command_line_ix}")]
  UnknownCommandLine { rule_ix: usize, command_line_ix: usize },

  #[error("rule #{rule_ix} references unknown source pattern #{source_ix}")]
  UnknownSource { rule_ix: usize, source_ix: usize },

  #[error("rule #{rule_ix} references unknown rule #{referenced}")]
  UnknownRule { rule_ix: usize, referenced: usize },

  #[error("rule #{rule_ix} has no inputs")]
  NoInputs { rule_ix: usize },

  #[error("command line template #{template_ix} uses unknown variable '{name}'")]
  UnknownVariable { template_ix: usize, name: String },

  #[error("source pattern #{ix}: {source}")]
  InvalidSourcePattern { ix: usize, source: PatternError },

  #[error("rule #{rule_ix} output: {source}")]
  InvalidOutputPattern { rule_ix: usize, source: PatternError },

  #[error("rule #{rule_ix}: {source}")]
  CaptureArity { rule_ix: usize, source: CaptureArityError },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
  #[serde(default)]
  command_line_templates: Vec<RawTemplate>,
  #[serde(default)]
  source_patterns: Vec<String>,
  #[serde(default)]
  rules: Vec<RawRule>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTemplate {
  binary_path: String,
  #[serde(default)]
  arguments: Vec<RawArgument>,
  #[serde(default)]
  environment: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArgument {
  #[serde(default)]
  literals: Vec<String>,
  #[serde(default)]
  variables: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
  command_line_ix: usize,
  inputs: Vec<InputRef>,
  output: String,
  #[serde(default)]
  dependencies: Vec<InputRef>,
  #[serde(default)]
  order_only_dependencies: Vec<InputRef>,
}

impl Manifest {
  /// Parse and validate a manifest from JSON bytes.
  pub fn load(bytes: &[u8]) -> Result<Self, ManifestError> {
    let raw: RawManifest = serde_json::from_slice(bytes)?;

    let command_line_templates = raw
      .command_line_templates
      .into_iter()
      .enumerate()
      .map(|(template_ix, t)| convert_template(template_ix, t))
      .collect::<Result<Vec<_>, _>>()?;

    let source_patterns = raw
      .source_patterns
      .iter()
      .enumerate()
      .map(|(ix, p)| SourcePattern::parse(p).map_err(|source| ManifestError::InvalidSourcePattern { ix, source }))
      .collect::<Result<Vec<_>, _>>()?;

    let rules = raw
      .rules
      .into_iter()
      .enumerate()
      .map(|(rule_ix, r)| {
        let output =
          OutputPattern::parse(&r.output).map_err(|source| ManifestError::InvalidOutputPattern { rule_ix, source })?;
        Ok(Rule {
          command_line_ix: r.command_line_ix,
          inputs: r.inputs,
          output,
          dependencies: r.dependencies,
          order_only_dependencies: r.order_only_dependencies,
        })
      })
      .collect::<Result<Vec<_>, ManifestError>>()?;

    let manifest = Self {
      command_line_templates,
      source_patterns,
      rules,
    };
    manifest.validate()?;
    Ok(manifest)
  }

  /// Read `updfile.json` from the project root.
  pub fn read_from_root(root: &Path) -> Result<Self, ManifestError> {
    let path = root.join(MANIFEST_FILE);
    let bytes = std::fs::read(&path).map_err(|source| {
      if source.kind() == std::io::ErrorKind::NotFound {
        ManifestError::Missing { path: path.clone() }
      } else {
        ManifestError::Read {
          path: path.clone(),
          source,
        }
      }
    })?;
    Self::load(&bytes)
  }

  /// Number of captures the paths referenced by `input` carry.
  pub fn capture_count(&self, input: InputRef) -> usize {
    match input {
      InputRef::Source(ix) => self.source_patterns[ix].group_count(),
      InputRef::Rule(ix) => self.rules[ix].output.group_count(),
    }
  }

  fn validate(&self) -> Result<(), ManifestError> {
    for (rule_ix, rule) in self.rules.iter().enumerate() {
      if rule.command_line_ix >= self.command_line_templates.len() {
        return Err(ManifestError::UnknownCommandLine {
          rule_ix,
          command_line_ix: rule.command_line_ix,
        });
      }
      if rule.inputs.is_empty() {
        return Err(ManifestError::NoInputs { rule_ix });
      }

      let refs = rule
        .inputs
        .iter()
        .chain(&rule.dependencies)
        .chain(&rule.order_only_dependencies);
      for input in refs {
        match *input {
          InputRef::Source(source_ix) if source_ix >= self.source_patterns.len() => {
            return Err(ManifestError::UnknownSource { rule_ix, source_ix });
          }
          InputRef::Rule(referenced) if referenced >= self.rules.len() => {
            return Err(ManifestError::UnknownRule { rule_ix, referenced });
          }
          _ => {}
        }
      }

      let required = rule.output.required_captures();
      for input in &rule.inputs {
        let available = self.capture_count(*input);
        if required > available {
          return Err(ManifestError::CaptureArity {
            rule_ix,
            source: CaptureArityError {
              pattern: rule.output.as_str().to_string(),
              placeholder: required,
              available,
            },
          });
        }
      }
    }
    Ok(())
  }
}

fn convert_template(template_ix: usize, raw: RawTemplate) -> Result<CommandLineTemplate, ManifestError> {
  let mut slots = Vec::new();
  for argument in raw.arguments {
    slots.extend(argument.literals.into_iter().map(TemplateSlot::Literal));
    for name in argument.variables {
      let slot = TemplateSlot::variable(&name).ok_or(ManifestError::UnknownVariable { template_ix, name })?;
      slots.push(slot);
    }
  }
  Ok(CommandLineTemplate {
    binary_path: raw.binary_path,
    slots,
    environment: raw.environment,
  })
}
