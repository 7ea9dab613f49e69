//! Rendering a graph for inspection: Graphviz and plain shell.

use std::fmt::Write;

use super::{BuildGraph, EdgeKind, GraphError};
use crate::consts::STATE_DIR;
use crate::manifest::shell_escape;
use crate::util::path::parent;

/// Render the graph in Graphviz dot format.
///
/// One edge is drawn per input file, labelled with the binary that consumes
/// it. Explicit dependencies on other targets are dashed, order-only ones
/// dotted.
pub fn render_dot(graph: &BuildGraph) -> Result<String, GraphError> {
  let mut out = String::new();
  out.push_str("digraph upd {\n");
  out.push_str("  rankdir=\"LR\";\n");
  for node in graph.topological_order()? {
    let target = graph.target(node);
    for input in &target.inputs {
      // Writing to a String cannot fail.
      let _ = writeln!(
        out,
        "  \"{}\" -> \"{}\" [label=\"{}\"];",
        dot_escape(input),
        dot_escape(&target.output),
        dot_escape(&target.command_line.binary_path)
      );
    }
  }
  for (pred, node, kind) in graph.edges() {
    let style = match kind {
      EdgeKind::Input => continue,
      EdgeKind::Dependency => "dashed",
      EdgeKind::OrderOnly => "dotted",
    };
    let _ = writeln!(
      out,
      "  \"{}\" -> \"{}\" [style=\"{}\"];",
      dot_escape(&graph.target(pred).output),
      dot_escape(&graph.target(node).output),
      style
    );
  }
  out.push_str("}\n");
  Ok(out)
}

/// Render a POSIX shell script that produces every target from scratch.
///
/// Commands appear in dependency order and the script stops at the first
/// failing command.
pub fn render_shell_script(graph: &BuildGraph) -> Result<String, GraphError> {
  let mut out = String::new();
  out.push_str("#!/bin/sh\n");
  out.push_str("set -e\n");
  let _ = writeln!(out, "mkdir -p {}/depfiles", STATE_DIR);

  let mut created: Vec<&str> = Vec::new();
  for node in graph.topological_order()? {
    let target = graph.target(node);
    let dirs = [parent(&target.output), target.dependency_file.as_deref().and_then(parent)];
    for dir in dirs.into_iter().flatten() {
      if !created.contains(&dir) {
        let _ = writeln!(out, "mkdir -p {}", shell_escape(dir));
        created.push(dir);
      }
    }
    let _ = writeln!(out, "{}", target.command_line);
  }
  Ok(out)
}

fn dot_escape(value: &str) -> String {
  value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::Manifest;
  use crate::pattern::Match;

  fn graph() -> BuildGraph {
    let manifest = Manifest::load(
      br#"{
      "command_line_templates": [
        { "binary_path": "cc", "arguments": [
          { "literals": ["-c"], "variables": ["input_files"] },
          { "literals": ["-o"], "variables": ["output_file"] },
          { "literals": ["-MF"], "variables": ["dependency_file"] } ] },
        { "binary_path": "ld", "arguments": [
          { "literals": ["-o"], "variables": ["output_file", "input_files"] } ] }
      ],
      "source_patterns": ["src/(*).c"],
      "rules": [
        { "command_line_ix": 0, "inputs": [{ "source_ix": 0 }], "output": "dist/obj/$1.o" },
        { "command_line_ix": 1, "inputs": [{ "rule_ix": 0 }], "output": "dist/my app" }
      ]
    }"#,
    )
    .unwrap();
    let matches = vec![vec![
      Match {
        path: "src/a.c".to_string(),
        captures: vec!["a".to_string()],
      },
      Match {
        path: "src/b.c".to_string(),
        captures: vec!["b".to_string()],
      },
    ]];
    BuildGraph::build(&manifest, &matches, &[]).unwrap()
  }

  #[test]
  fn dot_has_one_edge_per_input() {
    let dot = render_dot(&graph()).unwrap();
    assert!(dot.starts_with("digraph upd {\n"));
    assert!(dot.contains("  \"src/a.c\" -> \"dist/obj/a.o\" [label=\"cc\"];\n"));
    assert!(dot.contains("  \"dist/obj/b.o\" -> \"dist/my app\" [label=\"ld\"];\n"));
    assert_eq!(dot.matches(" -> ").count(), 4);
    assert!(dot.ends_with("}\n"));
  }

  #[test]
  fn dot_styles_dependency_edges() {
    let manifest = Manifest::load(
      br#"{
      "command_line_templates": [{ "binary_path": "gen" }, { "binary_path": "cc" }],
      "source_patterns": ["schema.json", "src/(*).c"],
      "rules": [
        { "command_line_ix": 0, "inputs": [{ "source_ix": 0 }], "output": "gen/schema.h" },
        { "command_line_ix": 0, "inputs": [{ "source_ix": 0 }], "output": "gen/config.h" },
        { "command_line_ix": 1, "inputs": [{ "source_ix": 1 }], "output": "dist/$1.o",
          "dependencies": [{ "rule_ix": 1 }], "order_only_dependencies": [{ "rule_ix": 0 }] }
      ]
    }"#,
    )
    .unwrap();
    let matches = vec![
      vec![Match {
        path: "schema.json".to_string(),
        captures: vec![],
      }],
      vec![Match {
        path: "src/main.c".to_string(),
        captures: vec!["main".to_string()],
      }],
    ];
    let graph = BuildGraph::build(&manifest, &matches, &[]).unwrap();

    let dot = render_dot(&graph).unwrap();
    assert!(dot.contains("  \"gen/config.h\" -> \"dist/main.o\" [style=\"dashed\"];\n"));
    assert!(dot.contains("  \"gen/schema.h\" -> \"dist/main.o\" [style=\"dotted\"];\n"));
    assert!(dot.contains("  \"src/main.c\" -> \"dist/main.o\" [label=\"cc\"];\n"));
    assert_eq!(dot.matches(" -> ").count(), 5);
  }

  #[test]
  fn shell_script_runs_commands_in_order() {
    let script = render_shell_script(&graph()).unwrap();
    let lines: Vec<&str> = script.lines().collect();

    assert_eq!(lines[0], "#!/bin/sh");
    assert!(lines.contains(&"mkdir -p dist/obj"));
    assert!(lines.contains(&"mkdir -p .upd/depfiles/dist/obj"));

    let compile = lines
      .iter()
      .position(|l| *l == "cc -c src/a.c -o dist/obj/a.o -MF .upd/depfiles/dist/obj/a.o.d")
      .unwrap();
    let link = lines
      .iter()
      .position(|l| *l == "ld -o 'dist/my app' dist/obj/a.o dist/obj/b.o")
      .unwrap();
    assert!(compile < link);
    assert_eq!(script.matches("mkdir -p dist/obj\n").count(), 1);
  }
}
