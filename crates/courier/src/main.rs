// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - a multi-channel notification dispatch service.
//!
//! This is the binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use courier_config::{load_config, load_config_from_path, CourierConfig};
use courier_core::CourierError;

mod seed;
mod serve;
mod shutdown;

/// Courier - a multi-channel notification dispatch service.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the API server, workers, and scheduler.
    Serve,
    /// Provision a user and print their API key once.
    Seed {
        /// Email address for the new user.
        #[arg(long)]
        email: String,
        /// Rate limit tier name.
        #[arg(long, default_value = "free")]
        tier: String,
    },
}

fn load(config_path: Option<&PathBuf>) -> Result<CourierConfig, CourierError> {
    let result = match config_path {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };
    result.map_err(|e| CourierError::Config(e.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Seed { email, tier } => seed::run_seed(config, email, tier).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
