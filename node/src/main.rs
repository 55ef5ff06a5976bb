// Copyright (c) 2026 Basin Contributors. MIT License.
// See LICENSE for details.

//! # Basin Demo Node
//!
//! Entry point for the `basin-node` binary. Parses CLI arguments,
//! initializes logging, and drives a fully wired in-memory vault through
//! one of the demo scenarios.
//!
//! The binary supports three subcommands:
//!
//! - `simulate` — run a deterministic multi-day scenario, print a summary
//! - `run`      — keeper loop on a fixed tick until Ctrl+C/SIGTERM
//! - `version`  — print build version information

mod cli;
mod logging;
mod scenario;

use anyhow::Result;
use clap::Parser;

use cli::{BasinNodeCli, Commands};
use logging::LogFormat;

/// Default filter directives when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "basin_node=info,basin_core=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BasinNodeCli::parse();

    match cli.command {
        Commands::Simulate(args) => {
            logging::init_logging(DEFAULT_LOG_FILTER, LogFormat::from_str_lossy(&args.log_format));
            let summary = scenario::simulate(&args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                scenario::print_summary(&summary);
            }
            Ok(())
        }
        Commands::Run(args) => {
            logging::init_logging(DEFAULT_LOG_FILTER, LogFormat::from_str_lossy(&args.log_format));
            scenario::run_keeper(&args).await
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("basin-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
