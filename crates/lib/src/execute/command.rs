//! Running one target's command.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::execute::types::ExecuteError;
use crate::manifest::CommandLine;

/// Run a command line from the project root and wait for it.
///
/// Standard output and error are inherited. Environment overrides are applied
/// on top of the parent environment.
pub async fn run_command(command: &CommandLine, root: &Path) -> Result<(), ExecuteError> {
  let program = program_path(&command.binary_path, root);
  debug!(program = ?program, args = ?command.args, "spawning process");

  let status = Command::new(&program)
    .args(&command.args)
    .envs(&command.environment)
    .current_dir(root)
    .stdin(Stdio::null())
    .status()
    .await
    .map_err(|source| ExecuteError::Spawn {
      binary: command.binary_path.clone(),
      source,
    })?;

  if !status.success() {
    return Err(ExecuteError::CommandFailed {
      cmd: command.to_string(),
      code: status.code(),
    });
  }
  Ok(())
}

/// Binaries given as relative paths with a directory part are relative to the
/// project root; bare names are looked up in `PATH`.
fn program_path(binary: &str, root: &Path) -> PathBuf {
  let path = Path::new(binary);
  if path.is_relative() && binary.contains('/') {
    root.join(path)
  } else {
    path.to_path_buf()
  }
}
