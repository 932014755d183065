//! SAP project documents from a language model.
//!
//! Each command collects input, asks the model for a draft, has the model
//! review its own draft against a checklist, checks the structure, and writes
//! the result. The review is a same-model completeness heuristic; it catches
//! missing sections, not wrong content.
mod cli;
mod config;
mod documents;
mod error;
mod lm;
mod markdown;
mod paths;
mod pipeline;
mod record;
mod report;
mod stages;
mod templates;
mod util;
mod workflow;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    init_tracing(args.command.common().verbose);
    workflow::run(args.command)
}

/// Log to stderr; `RUST_LOG` wins over the `--verbose` default.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
