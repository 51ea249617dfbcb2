//! keepsync CLI - download history and saved links from the terminal
//!
//! Every command works offline against the local snapshots; `keepsync sync`
//! reconciles them with the configured backend.

mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::gc::run_gc;
use crate::commands::history::run_history;
use crate::commands::links::run_links;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keepsync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = Context::new(cli.data_dir, cli.profile);

    match cli.command {
        Commands::History { command } => run_history(command, &context).await?,
        Commands::Links { command } => run_links(command, &context).await?,
        Commands::Sync { only, progress } => run_sync(only, progress, &context).await?,
        Commands::Gc { retention_days } => run_gc(retention_days, &context).await?,
        Commands::Config { command } => run_config(command, context.profile())?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
