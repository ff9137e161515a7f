//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "camsync")]
#[command(author, version, about = "Synchronized recording triggers for BLE cameras", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Read configuration from this file instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan for nearby BLE devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        timeout: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Connect to the configured cameras, send one keep-alive and disconnect
    Ping {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Follow a schedule: read one stage title per line from stdin
    Run {
        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Session settings that override the configuration file
#[derive(Debug, Clone, Default, Args)]
pub struct SessionArgs {
    /// Camera name(s) - can be specified multiple times, or comma-separated
    #[arg(short, long = "device", value_delimiter = ',', env = "CAMSYNC_DEVICES")]
    pub devices: Vec<String>,

    /// File with one camera name per line
    #[arg(long)]
    pub devices_file: Option<PathBuf>,

    /// Keyword that marks recorded stages
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Seconds to wait before stopping after a recorded stage ends
    #[arg(long)]
    pub delay: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_devices_comma_separated() {
        let cli = Cli::try_parse_from(["camsync", "ping", "-d", "GoPro A,GoPro B"]).unwrap();
        let Commands::Ping { session, format } = cli.command else {
            panic!("expected ping");
        };
        assert_eq!(session.devices, vec!["GoPro A", "GoPro B"]);
        assert_eq!(format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "camsync",
            "-v",
            "run",
            "--keyword",
            "[REC]",
            "--delay",
            "2",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Run { session } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(session.keyword.as_deref(), Some("[REC]"));
        assert_eq!(session.delay, Some(2));
    }
}
