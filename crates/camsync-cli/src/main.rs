use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use camsync_cli::cli::{Cli, Commands};
use camsync_cli::commands::{cmd_ping, cmd_run, cmd_scan};
use camsync_cli::config::{Config, resolve_session};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries command output, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    match cli.command {
        Commands::Scan {
            timeout,
            format,
            session,
        } => {
            let session = resolve_session(&session, &config)?;
            cmd_scan(timeout, format, &session.allow_list()).await?;
        }
        Commands::Ping { format, session } => {
            let session = resolve_session(&session, &config)?;
            tokio::task::spawn_blocking(move || cmd_ping(&session, format)).await??;
        }
        Commands::Run { session } => {
            let session = resolve_session(&session, &config)?;
            tokio::task::spawn_blocking(move || cmd_run(&session)).await??;
        }
    }

    Ok(())
}
