//! Implementation of the `upd init` command.
//!
//! Marks a directory as a project root by creating its `.updroot` file.

use std::path::Path;

use anyhow::{Context, Result};

use upd_lib::consts::MANIFEST_FILE;
use upd_lib::update::init_root;

use crate::output::{print_info, print_success, print_warning};

/// Execute the init command.
///
/// Creates `.updroot` in `dir` (the current directory by default). An existing
/// marker is left alone.
pub fn cmd_init(dir: Option<&Path>) -> Result<()> {
  let dir = match dir {
    Some(dir) => dir.to_path_buf(),
    None => std::env::current_dir().context("Failed to read current directory")?,
  };
  std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
  let dir = dunce::canonicalize(&dir).unwrap_or(dir);

  if init_root(&dir).context("Failed to initialize project root")? {
    print_success(&format!("Initialized project root at {}", dir.display()));
  } else {
    print_info(&format!("{} is already a project root", dir.display()));
  }

  if !dir.join(MANIFEST_FILE).exists() {
    print_warning(&format!("No {} yet; add one to define rules", MANIFEST_FILE));
  }
  Ok(())
}
