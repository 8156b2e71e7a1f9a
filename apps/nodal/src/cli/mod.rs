//! # Nodal CLI Module
//!
//! This module implements the CLI interface for Nodal.
//!
//! ## Available Commands
//!
//! - `run` - Evaluate the outputs requested by a graph file
//! - `check` - Build and validate a graph file without evaluating it
//! - `nodes` - List the builtin node types and their sockets

mod commands;

use clap::{Parser, Subcommand};
use nodal_core::NodalError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Nodal - lazy node-graph evaluator
///
/// Evaluates TOML graph files, computing only what the requested sockets need.
#[derive(Parser, Debug)]
#[command(name = "nodal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Evaluator configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a graph file
    Run {
        /// Path to the graph file
        graph: PathBuf,

        /// Worker threads (overrides the configuration file)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Also print every value observed during the run
        #[arg(long)]
        trace_values: bool,
    },

    /// Build and validate a graph file
    Check {
        /// Path to the graph file
        graph: PathBuf,
    },

    /// List builtin node types
    Nodes,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), NodalError> {
    let json = cli.json;
    match cli.command {
        Commands::Run {
            graph,
            threads,
            trace_values,
        } => {
            let mut config = crate::load_config(cli.config.as_deref())?;
            if let Some(threads) = threads {
                config.threads = threads;
            }
            let report = cmd_run(&graph, config, trace_values)?;
            print_run(&report, json);
            Ok(())
        }
        Commands::Check { graph } => {
            let report = cmd_check(&graph)?;
            print_check(&report, json);
            Ok(())
        }
        Commands::Nodes => {
            print_nodes(&cmd_nodes(), json);
            Ok(())
        }
    }
}
