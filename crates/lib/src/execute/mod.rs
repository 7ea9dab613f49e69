//! Target execution.
//!
//! A single coordinator owns the graph, the per-target states, the signature
//! store and the fingerprint cache. Worker tasks in a [`JoinSet`] only run one
//! command each and hand the exit status back through `join_next()`, so no
//! build state is ever shared between tasks.
//!
//! # Target lifecycle
//!
//! ```text
//! Pending -> Ready -> Running -> Committed
//!                 \          \-> Failed
//!                  \-> Committed (already fresh, no command run)
//! ```
//!
//! A target becomes ready once every predecessor is committed. The targets of
//! a failed one stay pending and are reported as skipped; everything else
//! keeps going.

pub mod command;
mod types;

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use petgraph::graph::NodeIndex;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

pub use command::run_command;
pub use types::*;

use crate::depfile;
use crate::graph::BuildGraph;
use crate::signature::{FingerprintCache, SignatureStore, Staleness};
use crate::util::path::local_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetState {
  Pending,
  Ready,
  Running,
  Committed,
  Failed,
}

type Completion = (NodeIndex, Result<(), ExecuteError>);

struct Coordinator<'a> {
  graph: &'a BuildGraph,
  store: &'a mut SignatureStore,
  root: &'a Path,
  config: &'a ExecuteConfig,
  cache: FingerprintCache,
  states: Vec<TargetState>,
  /// Predecessors not yet committed, per target.
  waiting: Vec<usize>,
  /// Ready targets by node index, which is output path order.
  ready: BTreeSet<usize>,
  report: BuildReport,
}

/// Bring every target of `graph` up to date.
///
/// Per-target failures are collected in the returned report rather than
/// returned as errors; the run continues with every target that does not
/// depend on a failed one.
pub async fn execute(
  graph: &BuildGraph,
  store: &mut SignatureStore,
  root: &Path,
  config: &ExecuteConfig,
) -> BuildReport {
  info!(targets = graph.len(), parallelism = config.parallelism, "starting execution");

  let mut coordinator = Coordinator::new(graph, store, root, config);
  coordinator.run().await;
  let report = coordinator.report;

  info!(
    total = report.total(),
    executed = report.executed.len(),
    up_to_date = report.up_to_date.len(),
    failed = report.failed.len(),
    skipped = report.skipped.len(),
    "execution complete"
  );
  report
}

impl<'a> Coordinator<'a> {
  fn new(graph: &'a BuildGraph, store: &'a mut SignatureStore, root: &'a Path, config: &'a ExecuteConfig) -> Self {
    let mut states = vec![TargetState::Pending; graph.len()];
    let mut waiting = vec![0; graph.len()];
    let mut ready = BTreeSet::new();
    for node in graph.nodes() {
      let count = graph.predecessors(node).len();
      waiting[node.index()] = count;
      if count == 0 {
        states[node.index()] = TargetState::Ready;
        ready.insert(node.index());
      }
    }

    Self {
      graph,
      store,
      root,
      config,
      cache: FingerprintCache::new(root),
      states,
      waiting,
      ready,
      report: BuildReport::default(),
    }
  }

  async fn run(&mut self) {
    let parallelism = self.config.parallelism.max(1);
    let mut running: JoinSet<Completion> = JoinSet::new();

    loop {
      while running.len() < parallelism {
        let Some(ix) = self.ready.pop_first() else {
          break;
        };
        self.dispatch(NodeIndex::new(ix), &mut running).await;
      }

      let Some(joined) = running.join_next().await else {
        break;
      };
      match joined {
        Ok((node, Ok(()))) => match self.finish(node) {
          Ok(()) => {
            let output = self.graph.target(node).output.clone();
            info!(target_path = %output, "updated");
            self.report.executed.push(output);
            self.commit(node);
          }
          Err(e) => self.fail(node, e),
        },
        Ok((node, Err(e))) => self.fail(node, e),
        // The node stays Running and is reported once the set drains.
        Err(e) => error!(error = %e, "worker task failed"),
      }
    }

    for ix in 0..self.states.len() {
      if self.states[ix] == TargetState::Running {
        let err = ExecuteError::Join("task ended without reporting a result".to_string());
        self.fail(NodeIndex::new(ix), err);
      }
    }
    self.collect_skipped();
  }

  /// Start a ready target, or settle it at once if it is already fresh or
  /// cannot be started.
  async fn dispatch(&mut self, node: NodeIndex, running: &mut JoinSet<Completion>) {
    let graph = self.graph;
    let target = graph.target(node);

    match self.store.is_stale(target, &mut self.cache) {
      Ok(Staleness::Fresh) => {
        debug!(target_path = %target.output, "up to date");
        self.report.up_to_date.push(target.output.clone());
        self.commit(node);
        return;
      }
      Ok(Staleness::Stale(reason)) => {
        info!(target_path = %target.output, reason = %reason, "updating");
      }
      Err(e) => {
        self.fail(node, e.into());
        return;
      }
    }

    if let Err(e) = self.prepare(node).await {
      self.fail(node, e);
      return;
    }

    if self.config.print_commands {
      println!("$ {}", target.command_line);
    }
    debug!(target_path = %target.output, command = %target.command_line, "running command");

    self.states[node.index()] = TargetState::Running;
    let command = target.command_line.clone();
    let root = self.root.to_path_buf();
    running.spawn(async move { (node, run_command(&command, &root).await) });
  }

  /// Make room for the command's outputs.
  async fn prepare(&mut self, node: NodeIndex) -> Result<(), ExecuteError> {
    let graph = self.graph;
    let target = graph.target(node);
    self.cache.invalidate(&target.output);

    let output = self.root.join(&target.output);
    create_parent(&output).await?;

    if let Some(dependency_file) = &target.dependency_file {
      let path = self.root.join(dependency_file);
      create_parent(&path).await?;
      match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(ExecuteError::Io { path, source }),
      }
    }
    Ok(())
  }

  /// Ingest the dependency file of a successful command and record the build.
  fn finish(&mut self, node: NodeIndex) -> Result<(), ExecuteError> {
    let graph = self.graph;
    let target = graph.target(node);
    let mut discovered = BTreeSet::new();

    if let Some(dependency_file) = &target.dependency_file
      && let Some(entries) = depfile::read(&self.root.join(dependency_file))?
    {
      for dependency in depfile::dependencies_of(&entries, self.root, &target.output) {
        let Some(local) = local_path(self.root, self.root, Path::new(dependency)) else {
          debug!(target_path = %target.output, dependency, "ignoring dependency outside the project");
          continue;
        };
        if local == target.output || target.inputs.contains(&local) {
          continue;
        }
        if let Some(rule_ix) = graph.generated_by(&local)
          && !target.declares(&local)
        {
          return Err(ExecuteError::UndeclaredRuleDependency {
            dependency: local,
            rule_ix,
          });
        }
        discovered.insert(local);
      }
    }

    self.store.commit(target, &discovered, &mut self.cache)?;
    Ok(())
  }

  fn commit(&mut self, node: NodeIndex) {
    self.states[node.index()] = TargetState::Committed;
    for dependent in self.graph.dependents(node) {
      let ix = dependent.index();
      self.waiting[ix] = self.waiting[ix].saturating_sub(1);
      if self.waiting[ix] == 0 && self.states[ix] == TargetState::Pending {
        self.states[ix] = TargetState::Ready;
        self.ready.insert(ix);
      }
    }
  }

  fn fail(&mut self, node: NodeIndex, err: ExecuteError) {
    let output = self.graph.target(node).output.clone();
    error!(target_path = %output, error = %err, "target failed");
    self.states[node.index()] = TargetState::Failed;
    self.report.failed.push((output, err));
  }

  /// Report every target left pending, naming a failed target it waited on.
  fn collect_skipped(&mut self) {
    let Ok(order) = self.graph.topological_order() else {
      return;
    };
    // Failed target each pending target is blocked by, filled in dependency order.
    let mut blocked_by: Vec<Option<NodeIndex>> = vec![None; self.states.len()];
    for node in order {
      if self.states[node.index()] != TargetState::Pending {
        continue;
      }
      let blocker = self.graph.predecessors(node).into_iter().find_map(|pred| {
        match self.states[pred.index()] {
          TargetState::Failed => Some(pred),
          TargetState::Pending => blocked_by[pred.index()],
          _ => None,
        }
      });
      blocked_by[node.index()] = blocker;

      let output = self.graph.target(node).output.clone();
      let blocker = blocker
        .map(|b| self.graph.target(b).output.clone())
        .unwrap_or_default();
      debug!(target_path = %output, blocked_by = %blocker, "skipped");
      self.report.skipped.push((output, blocker));
    }
  }
}

async fn create_parent(path: &Path) -> Result<(), ExecuteError> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(|source| ExecuteError::Io {
      path: parent.to_path_buf(),
      source,
    })?;
  }
  Ok(())
}
