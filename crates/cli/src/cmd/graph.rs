//! Implementation of the `upd graph` and `upd script` commands.
//!
//! Both render the planned targets without running anything or touching the
//! state directory.

use std::path::Path;

use anyhow::{Context, Result};

use upd_lib::execute::ExecuteConfig;
use upd_lib::graph::{render_dot, render_shell_script};
use upd_lib::update::{UpdateOptions, plan};

use super::locate_project;

fn plan_options(root_override: Option<&Path>, targets: Vec<String>) -> Result<UpdateOptions> {
  let project = locate_project(root_override)?;
  Ok(UpdateOptions {
    root: project.root,
    working_dir: project.working_dir,
    targets,
    execute: ExecuteConfig::default(),
  })
}

/// Print the target graph in Graphviz dot format.
pub fn cmd_graph(root_override: Option<&Path>, targets: Vec<String>) -> Result<()> {
  let options = plan_options(root_override, targets)?;
  let (_manifest, graph) = plan(&options).context("Failed to plan build")?;
  print!("{}", render_dot(&graph)?);
  Ok(())
}

/// Print a shell script that builds the targets from scratch.
pub fn cmd_script(root_override: Option<&Path>, targets: Vec<String>) -> Result<()> {
  let options = plan_options(root_override, targets)?;
  let (_manifest, graph) = plan(&options).context("Failed to plan build")?;
  print!("{}", render_shell_script(&graph)?);
  Ok(())
}
