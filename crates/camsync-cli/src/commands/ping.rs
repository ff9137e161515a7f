//! Ping command implementation.
//!
//! Connects the configured cameras, runs one keep-alive round and disconnects,
//! reporting how many cameras answered each step.

use anyhow::{Context, Result, bail};
use camsync_core::bridge::default_timeout;
use camsync_core::{
    CommandBridge, CommandKind, CommandResult, LinkStatus, SessionConfig, Transport,
};
use serde::Serialize;

use crate::cli::OutputFormat;

/// Results of one ping session.
#[derive(Debug, Serialize)]
pub struct PingReport {
    pub devices: Vec<String>,
    pub status: String,
    pub connect: CommandResult,
    pub keep_alive: CommandResult,
    pub disconnect: CommandResult,
}

impl PingReport {
    fn format_text(&self) -> String {
        format!(
            "Cameras:    {}\nConnect:    {}/{}\nKeep-alive: {}/{}\nDisconnect: {}/{}\nStatus:     {}\n",
            self.devices.join(", "),
            self.connect.success_count,
            self.connect.fleet_size,
            self.keep_alive.success_count,
            self.keep_alive.fleet_size,
            self.disconnect.success_count,
            self.disconnect.fleet_size,
            self.status,
        )
    }
}

/// Run a ping session over `transport`.
pub fn ping(session: &SessionConfig, transport: Box<dyn Transport>) -> Result<PingReport> {
    let bridge = CommandBridge::new(session.link_options(), session.worker_options());
    bridge
        .start(transport, session.allow_list())
        .context("Failed to start worker")?;

    let execute = |kind: CommandKind| bridge.execute(kind, None, default_timeout(kind));
    let connect = execute(CommandKind::Connect);
    let status = LinkStatus::from_connect(&connect).to_string();
    let keep_alive = execute(CommandKind::KeepAlive);
    let disconnect = execute(CommandKind::Disconnect);

    Ok(PingReport {
        devices: session.allow_list().names().to_vec(),
        status,
        connect,
        keep_alive,
        disconnect,
    })
}

pub fn cmd_ping(session: &SessionConfig, format: OutputFormat) -> Result<()> {
    if session.device_names.is_empty() {
        bail!("No cameras configured. Pass --device or set device_names in the config file");
    }

    let report = ping(session, Box::new(session.ble_transport()))?;
    match format {
        OutputFormat::Text => print!("{}", report.format_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.connect.success_count == 0 {
        bail!("No camera answered");
    }
    Ok(())
}
