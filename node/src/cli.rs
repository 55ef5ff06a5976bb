//! # CLI Interface
//!
//! Defines the command-line argument structure for `basin-node` using
//! `clap` derive. Supports three subcommands: `simulate`, `run`, and
//! `version`.

use clap::{Parser, Subcommand};

/// Basin vault demo binary.
///
/// Drives a fully wired in-memory vault — accounting engine, settlement
/// queue, ledger, roles — through oracle rate pushes, user requests,
/// batch settlements, and fee claims. Useful for demonstrating the
/// vault's behavior end to end and for watching its structured log
/// stream.
#[derive(Parser, Debug)]
#[command(
    name = "basin-node",
    about = "Basin vault demo and keeper binary",
    version,
    propagate_version = true
)]
pub struct BasinNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Basin node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a deterministic multi-day vault scenario and print a summary.
    Simulate(SimulateArgs),
    /// Run the keeper loop: push oracle rates and settle demo batches on
    /// a fixed tick until interrupted.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Number of simulated days to advance, one oracle push per day.
    #[arg(long, env = "BASIN_DAYS", default_value_t = 30)]
    pub days: u32,

    /// Number of demo users placing requests.
    #[arg(long, env = "BASIN_USERS", default_value_t = 8)]
    pub users: usize,

    /// Seed for the scenario's random request generation. Same seed,
    /// same scenario.
    #[arg(long, env = "BASIN_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Print the summary as JSON instead of the human-readable report.
    #[arg(long)]
    pub json: bool,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "BASIN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Seconds between keeper ticks.
    #[arg(long, env = "BASIN_TICK_SECS", default_value_t = 60)]
    pub tick_secs: u64,

    /// Seed for the keeper's random request generation.
    #[arg(long, env = "BASIN_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "BASIN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}
