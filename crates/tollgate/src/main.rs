// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tollgate - per-user usage tracking and budget gate for metered LLM access.
//!
//! This is the binary entry point. A chat transport calls `check` before a
//! model request and `record` or `fetch` after it.

mod config_dump;
mod gate;
mod runtime;
mod stats;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tollgate_core::TollgateError;

use crate::runtime::Runtime;

/// Exit code for a denied check or refused stats request.
const EXIT_DENIED: u8 = 2;

/// Tollgate - per-user usage tracking and budget gate.
#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Decide whether a user may make another metered call.
    Check {
        user_id: String,
        /// Display name to store with the user's record.
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Add a known cost (USD) to a user's ledger.
    Record {
        user_id: String,
        amount: f64,
        #[arg(long)]
        json: bool,
    },
    /// Look up a generation's cost on OpenRouter and add it to a user's ledger.
    Fetch {
        user_id: String,
        generation_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Show a user's spend.
    Stats {
        user_id: String,
        /// Check visibility for this viewer instead of the user themself.
        #[arg(long = "as", value_name = "VIEWER")]
        viewer: Option<String>,
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tollgate_config::load_and_validate_path(path),
        None => tollgate_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tollgate_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging.level);

    let runtime = match Runtime::from_config(config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("tollgate: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&runtime, cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_DENIED),
        Err(e) => {
            eprintln!("tollgate: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Dispatch a command. `Ok(false)` means the request was denied.
async fn run(runtime: &Runtime, command: Commands) -> Result<bool, TollgateError> {
    match command {
        Commands::Check {
            user_id,
            name,
            json,
        } => gate::run_check(runtime, &user_id, &name, json).await,
        Commands::Record {
            user_id,
            amount,
            json,
        } => gate::run_record(runtime, &user_id, amount, json)
            .await
            .map(|()| true),
        Commands::Fetch {
            user_id,
            generation_id,
            json,
        } => gate::run_fetch(runtime, &user_id, &generation_id, json)
            .await
            .map(|()| true),
        Commands::Stats {
            user_id,
            viewer,
            json,
            plain,
        } => stats::run_stats(runtime, &user_id, viewer.as_deref(), json, plain).await,
        Commands::Config => {
            config_dump::run_config(&runtime.config);
            Ok(true)
        }
    }
}

/// Install the fmt subscriber. `RUST_LOG` overrides the configured level.
///
/// Logs go to stderr so `--json` output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tollgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
