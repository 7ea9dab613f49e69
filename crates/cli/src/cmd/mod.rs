mod graph;
mod init;
mod root;
mod update;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use upd_lib::update::find_root;

pub use graph::{cmd_graph, cmd_script};
pub use init::cmd_init;
pub use root::cmd_root;
pub use update::{UpdateArgs, cmd_update};

/// Project root and the directory targets are relative to.
pub struct Project {
  pub root: PathBuf,
  pub working_dir: PathBuf,
}

/// Locate the project from `--root`/`UPD_ROOT`, or by walking up from the
/// current directory.
///
/// Targets are relative to the current directory when it lies inside the
/// root, and relative to the root otherwise.
pub fn locate_project(root_override: Option<&Path>) -> Result<Project> {
  let cwd = std::env::current_dir().context("Failed to read current directory")?;
  let cwd = dunce::canonicalize(&cwd).unwrap_or(cwd);

  let root = match root_override {
    Some(dir) => {
      dunce::canonicalize(dir).with_context(|| format!("Project root {} is not accessible", dir.display()))?
    }
    None => find_root(&cwd)?,
  };

  let working_dir = if cwd.starts_with(&root) { cwd } else { root.clone() };
  Ok(Project { root, working_dir })
}
