//! Implementation of the `upd root` command.

use std::path::Path;

use anyhow::Result;

use super::locate_project;

/// Print the project root.
pub fn cmd_root(root_override: Option<&Path>) -> Result<()> {
  let project = locate_project(root_override)?;
  println!("{}", project.root.display());
  Ok(())
}
