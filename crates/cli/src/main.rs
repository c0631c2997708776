//! # fe-master CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Configuration loading and validation
//! - UDP bridges onto the run controller's control and heartbeat channels
//! - Graceful shutdown handling

mod bridge;
mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_frontend, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // metrics are started by `run` only
    let config = ObservabilityConfig::from_verbosity(cli.verbose, cli.quiet, cli.log_format.into(), 0);
    observability::init_tracing(&config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "fe-master starting");

    let result = match &cli.command {
        Commands::Run(args) => run_frontend(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
