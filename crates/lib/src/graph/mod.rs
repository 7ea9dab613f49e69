//! Dependency graph construction.
//!
//! The graph is built in three steps:
//!
//! 1. Rules are resolved depth-first over rule indices. Resolving a rule
//!    expands its output pattern once per matched input path. Matches of one
//!    rule that expand to the same output are folded into a single target with
//!    several inputs, which is how one rule concatenates many files.
//! 2. Outputs are checked for uniqueness across rules.
//! 3. The requested targets and everything they transitively need are
//!    selected and stored in a [`DiGraph`] with edges from each predecessor to
//!    its dependent.

mod render;
mod types;

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

pub use render::{render_dot, render_shell_script};
pub use types::*;

use crate::consts::{DEPFILE_DIR, STATE_DIR};
use crate::manifest::{InputRef, Manifest, ReifyParams};
use crate::pattern::Match;
use crate::util::path::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
  Unvisited,
  InProgress,
  Done,
}

/// An output of a rule before it becomes a [`Target`].
#[derive(Debug)]
struct RuleOutput {
  path: String,
  captures: Vec<String>,
  inputs: Vec<String>,
}

struct RuleResolver<'a> {
  manifest: &'a Manifest,
  matches: &'a [Vec<Match>],
  states: Vec<VisitState>,
  outputs: Vec<Vec<RuleOutput>>,
  stack: Vec<usize>,
}

impl<'a> RuleResolver<'a> {
  fn new(manifest: &'a Manifest, matches: &'a [Vec<Match>]) -> Self {
    let rule_count = manifest.rules.len();
    Self {
      manifest,
      matches,
      states: vec![VisitState::Unvisited; rule_count],
      outputs: (0..rule_count).map(|_| Vec::new()).collect(),
      stack: Vec::new(),
    }
  }

  fn resolve(&mut self, rule_ix: usize) -> Result<(), GraphError> {
    let manifest = self.manifest;
    match self.states[rule_ix] {
      VisitState::Done => return Ok(()),
      VisitState::InProgress => {
        let start = self.stack.iter().position(|&r| r == rule_ix).unwrap_or(0);
        let cycle = self.stack[start..]
          .iter()
          .chain(std::iter::once(&rule_ix))
          .map(|&r| manifest.rules[r].output.as_str().to_string())
          .collect();
        return Err(GraphError::CyclicDependency { cycle });
      }
      VisitState::Unvisited => {}
    }

    self.states[rule_ix] = VisitState::InProgress;
    self.stack.push(rule_ix);

    let rule = &manifest.rules[rule_ix];
    for reference in rule.dependencies.iter().chain(&rule.order_only_dependencies) {
      if let InputRef::Rule(dep_ix) = *reference {
        self.resolve(dep_ix)?;
      }
    }

    let mut outputs: Vec<RuleOutput> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();
    for input in &rule.inputs {
      for (path, captures) in self.paths_with_captures(*input)? {
        let expanded = rule
          .output
          .expand(&captures)
          .map_err(|source| GraphError::CaptureArity { rule_ix, source })?;
        let output = normalize(&expanded.path).ok_or_else(|| GraphError::InvalidOutput {
          rule_ix,
          output: expanded.path.clone(),
        })?;

        match by_path.get(&output) {
          Some(&ix) => {
            let existing = &mut outputs[ix];
            if !existing.inputs.contains(&path) {
              existing.inputs.push(path);
            }
          }
          None => {
            by_path.insert(output.clone(), outputs.len());
            outputs.push(RuleOutput {
              path: output,
              captures: expanded.captures,
              inputs: vec![path],
            });
          }
        }
      }
    }

    debug!(rule = rule_ix, outputs = outputs.len(), "resolved rule");
    self.outputs[rule_ix] = outputs;
    self.states[rule_ix] = VisitState::Done;
    self.stack.pop();
    Ok(())
  }

  fn paths_with_captures(&mut self, input: InputRef) -> Result<Vec<(String, Vec<String>)>, GraphError> {
    match input {
      InputRef::Source(ix) => Ok(
        self.matches[ix]
          .iter()
          .map(|m| (m.path.clone(), m.captures.clone()))
          .collect(),
      ),
      InputRef::Rule(ix) => {
        self.resolve(ix)?;
        Ok(
          self.outputs[ix]
            .iter()
            .map(|o| (o.path.clone(), o.captures.clone()))
            .collect(),
        )
      }
    }
  }

  /// Every path a reference stands for. Only valid once all rules are resolved.
  fn paths(&self, input: InputRef) -> Vec<String> {
    match input {
      InputRef::Source(ix) => self.matches[ix].iter().map(|m| m.path.clone()).collect(),
      InputRef::Rule(ix) => self.outputs[ix].iter().map(|o| o.path.clone()).collect(),
    }
  }
}

/// The selected targets and the edges between them.
#[derive(Debug)]
pub struct BuildGraph {
  graph: DiGraph<Target, EdgeKind>,
  by_output: HashMap<String, NodeIndex>,
  /// Every output declared by the manifest, selected or not, with its rule.
  generated: HashMap<String, usize>,
}

impl BuildGraph {
  /// Build the graph for `requested` outputs, or for every output when empty.
  ///
  /// `matches` holds the resolved files of each source pattern, in manifest
  /// order.
  ///
  /// # Errors
  ///
  /// Fails on rule or target cycles, on outputs produced by more than one rule,
  /// on placeholders an input cannot satisfy and on unknown requested targets.
  /// Nothing is executed or written when this fails.
  pub fn build(manifest: &Manifest, matches: &[Vec<Match>], requested: &[String]) -> Result<Self, GraphError> {
    let mut resolver = RuleResolver::new(manifest, matches);
    for rule_ix in 0..manifest.rules.len() {
      resolver.resolve(rule_ix)?;
    }

    let mut generated: HashMap<String, usize> = HashMap::new();
    for (rule_ix, outputs) in resolver.outputs.iter().enumerate() {
      for output in outputs {
        if let Some(&first_rule) = generated.get(&output.path) {
          return Err(GraphError::AmbiguousOutput {
            output: output.path.clone(),
            first_rule,
            second_rule: rule_ix,
          });
        }
        generated.insert(output.path.clone(), rule_ix);
      }
    }

    let mut targets: Vec<Target> = Vec::new();
    for (rule_ix, rule) in manifest.rules.iter().enumerate() {
      let template = &manifest.command_line_templates[rule.command_line_ix];
      let dependencies: Vec<String> = rule.dependencies.iter().flat_map(|d| resolver.paths(*d)).collect();
      let order_only: Vec<String> = rule
        .order_only_dependencies
        .iter()
        .flat_map(|d| resolver.paths(*d))
        .collect();

      for output in &resolver.outputs[rule_ix] {
        let dependency_file = format!("{}/{}/{}.d", STATE_DIR, DEPFILE_DIR, output.path);
        let command_line = template.reify(ReifyParams {
          input_files: &output.inputs,
          output_file: &output.path,
          dependency_file: &dependency_file,
        });
        targets.push(Target {
          output: output.path.clone(),
          rule_ix,
          command_line_ix: rule.command_line_ix,
          inputs: output.inputs.clone(),
          dependencies: dependencies.clone(),
          order_only: order_only.clone(),
          dependency_file: template.declares_dependency_file().then_some(dependency_file),
          command_line,
        });
      }
    }

    let index: HashMap<String, usize> = targets.iter().enumerate().map(|(ix, t)| (t.output.clone(), ix)).collect();

    let roots: Vec<usize> = if requested.is_empty() {
      (0..targets.len()).collect()
    } else {
      requested
        .iter()
        .map(|path| index.get(path).copied().ok_or_else(|| GraphError::UnknownTarget(path.clone())))
        .collect::<Result<_, _>>()?
    };

    let mut states = vec![VisitState::Unvisited; targets.len()];
    let mut stack = Vec::new();
    for root in roots {
      select(root, &targets, &index, &mut states, &mut stack)?;
    }

    let mut selected: Vec<Target> = targets
      .into_iter()
      .zip(&states)
      .filter(|(_, state)| **state == VisitState::Done)
      .map(|(target, _)| target)
      .collect();
    selected.sort_by(|a, b| a.output.cmp(&b.output));

    let mut graph = DiGraph::with_capacity(selected.len(), selected.len());
    let mut by_output = HashMap::new();
    for target in selected {
      let output = target.output.clone();
      let node = graph.add_node(target);
      by_output.insert(output, node);
    }

    for node in graph.node_indices().collect::<Vec<_>>() {
      let target = &graph[node];
      let mut edges = Vec::new();
      let kinds = [
        (&target.inputs, EdgeKind::Input),
        (&target.dependencies, EdgeKind::Dependency),
        (&target.order_only, EdgeKind::OrderOnly),
      ];
      for (paths, kind) in kinds {
        for path in paths {
          if let Some(&pred) = by_output.get(path)
            && !edges.iter().any(|(p, _)| *p == pred)
          {
            edges.push((pred, kind));
          }
        }
      }
      for (pred, kind) in edges {
        graph.add_edge(pred, node, kind);
      }
    }

    debug!(targets = graph.node_count(), edges = graph.edge_count(), "built dependency graph");

    Ok(Self {
      graph,
      by_output,
      generated,
    })
  }

  /// Number of selected targets.
  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Node indices, ordered by output path.
  pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
    self.graph.node_indices()
  }

  pub fn target(&self, node: NodeIndex) -> &Target {
    &self.graph[node]
  }

  /// Look up a selected target by output path.
  pub fn node(&self, output: &str) -> Option<NodeIndex> {
    self.by_output.get(output).copied()
  }

  /// Selected targets that must complete before `node` can run.
  pub fn predecessors(&self, node: NodeIndex) -> Vec<NodeIndex> {
    self.graph.neighbors_directed(node, Direction::Incoming).collect()
  }

  /// Selected targets waiting on `node`.
  pub fn dependents(&self, node: NodeIndex) -> Vec<NodeIndex> {
    self.graph.neighbors_directed(node, Direction::Outgoing).collect()
  }

  /// All edges as `(predecessor, dependent, kind)`.
  pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, EdgeKind)> + '_ {
    use petgraph::visit::EdgeRef;
    self
      .graph
      .edge_references()
      .map(|e| (e.source(), e.target(), *e.weight()))
  }

  /// Targets ordered so that predecessors come first.
  pub fn topological_order(&self) -> Result<Vec<NodeIndex>, GraphError> {
    toposort(&self.graph, None).map_err(|cycle| GraphError::CyclicDependency {
      cycle: vec![self.graph[cycle.node_id()].output.clone()],
    })
  }

  /// The rule producing `path`, if any rule does.
  pub fn generated_by(&self, path: &str) -> Option<usize> {
    self.generated.get(path).copied()
  }
}

fn select(
  ix: usize,
  targets: &[Target],
  index: &HashMap<String, usize>,
  states: &mut [VisitState],
  stack: &mut Vec<usize>,
) -> Result<(), GraphError> {
  match states[ix] {
    VisitState::Done => return Ok(()),
    VisitState::InProgress => {
      let start = stack.iter().position(|&t| t == ix).unwrap_or(0);
      let cycle = stack[start..]
        .iter()
        .chain(std::iter::once(&ix))
        .map(|&t| targets[t].output.clone())
        .collect();
      return Err(GraphError::CyclicDependency { cycle });
    }
    VisitState::Unvisited => {}
  }

  states[ix] = VisitState::InProgress;
  stack.push(ix);
  let target = &targets[ix];
  for path in target.inputs.iter().chain(&target.dependencies).chain(&target.order_only) {
    if let Some(&pred) = index.get(path) {
      select(pred, targets, index, states, stack)?;
    }
  }
  stack.pop();
  states[ix] = VisitState::Done;
  Ok(())
}
