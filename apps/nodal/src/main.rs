//! # Nodal - Node-Graph Evaluator
//!
//! The command-line front end of the lazy node-graph evaluator.
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate the outputs requested by a graph file
//! nodal run scene.toml --threads 4
//!
//! # Validate a graph file
//! nodal check scene.toml
//!
//! # List the builtin node types
//! nodal nodes
//! ```

use clap::Parser;
use nodal::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // NODAL_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("NODAL_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nodal=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the one-line startup banner.
fn print_banner() {
    eprintln!("nodal v{} - lazy node-graph evaluator", env!("CARGO_PKG_VERSION"));
}
