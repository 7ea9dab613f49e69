mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{UpdateArgs, cmd_graph, cmd_init, cmd_root, cmd_script, cmd_update};
use output::print_error;

/// upd - incremental build engine
///
/// Without a subcommand, brings the given targets (or every target) up to
/// date.
#[derive(Parser)]
#[command(name = "upd")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Project root (default: nearest directory with a .updroot marker)
  #[arg(long, global = true, env = "UPD_ROOT")]
  root: Option<PathBuf>,

  #[command(flatten)]
  update: UpdateArgs,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the target graph in Graphviz dot format
  Graph {
    /// Targets to include (default: all)
    targets: Vec<String>,
  },

  /// Print a shell script that builds the targets from scratch
  Script {
    /// Targets to include (default: all)
    targets: Vec<String>,
  },

  /// Print the project root
  Root,

  /// Mark a directory as a project root
  Init {
    /// Directory to initialize (default: current directory)
    dir: Option<PathBuf>,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let root = cli.root.as_deref();
  let result = match cli.command {
    None => cmd_update(root, cli.update),
    Some(Commands::Graph { targets }) => cmd_graph(root, targets).map(|()| true),
    Some(Commands::Script { targets }) => cmd_script(root, targets).map(|()| true),
    Some(Commands::Root) => cmd_root(root).map(|()| true),
    Some(Commands::Init { dir }) => cmd_init(dir.as_deref()).map(|()| true),
  };

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::from(1),
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::from(2)
    }
  }
}
