//! Implementation of the default `upd [TARGETS]` command.
//!
//! Brings the requested targets (or every target) up to date and prints one
//! line per failed or skipped target.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use upd_lib::execute::{ExecuteConfig, num_cpus};
use upd_lib::update::{UpdateOptions, update};

use super::locate_project;
use crate::output::{format_elapsed, print_error, print_stat, print_success, print_warning, symbols};

#[derive(Debug, Args)]
pub struct UpdateArgs {
  /// Targets to update, relative to the current directory (default: all)
  pub targets: Vec<String>,

  /// Update every target (same as giving no targets)
  #[arg(long, conflicts_with = "targets")]
  pub all: bool,

  /// Maximum number of commands to run at once: a number or "auto"
  #[arg(
    short = 'j',
    long,
    env = "UPD_CONCURRENCY",
    default_value = "auto",
    value_parser = parse_concurrency
  )]
  pub concurrency: usize,

  /// Print each command line before running it
  #[arg(long)]
  pub print_commands: bool,
}

/// Parse a concurrency setting: `auto` for the number of CPUs, or a positive
/// number.
pub fn parse_concurrency(value: &str) -> Result<usize, String> {
  if value.eq_ignore_ascii_case("auto") {
    return Ok(num_cpus());
  }
  match value.parse::<usize>() {
    Ok(0) => Err("concurrency must be at least 1".to_string()),
    Ok(n) => Ok(n),
    Err(_) => Err(format!("expected a positive number or \"auto\", got \"{}\"", value)),
  }
}

/// Execute the update command.
///
/// Returns `Ok(false)` when the run completed but some target failed.
///
/// # Errors
///
/// Returns an error when the project cannot be located or when the manifest,
/// patterns or graph are invalid. Nothing is executed in that case.
pub fn cmd_update(root_override: Option<&Path>, args: UpdateArgs) -> Result<bool> {
  let start = Instant::now();
  let project = locate_project(root_override)?;

  let options = UpdateOptions {
    root: project.root,
    working_dir: project.working_dir,
    targets: args.targets,
    execute: ExecuteConfig {
      parallelism: args.concurrency,
      print_commands: args.print_commands,
    },
  };
  debug!(?options, all = args.all, "update options");

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt.block_on(update(&options)).context("Update failed")?;
  let report = &result.report;

  for (output, err) in &report.failed {
    print_error(&format!("{}: {}", output, err));
  }
  for (output, blocker) in &report.skipped {
    print_warning(&format!("{}: skipped {} {} failed", output, symbols::ARROW, blocker));
  }

  let elapsed = format_elapsed(start.elapsed());
  if report.is_success() {
    if report.executed.is_empty() {
      print_success(&format!("{} target(s) up to date ({})", result.selected, elapsed));
    } else {
      print_success(&format!(
        "Updated {} of {} target(s) ({})",
        report.executed.len(),
        result.selected,
        elapsed
      ));
    }
    return Ok(true);
  }

  print_error(&format!(
    "{} target(s) failed, {} skipped ({})",
    report.failed.len(),
    report.skipped.len(),
    elapsed
  ));
  print_stat("Updated", &report.executed.len().to_string());
  print_stat("Up to date", &report.up_to_date.len().to_string());
  Ok(false)
}
