//! Scan command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use camsync_core::{AllowList, DiscoveredDevice, ScanOptions, scan_with_options};
use serde::Serialize;

use crate::cli::OutputFormat;

#[derive(Debug, Serialize)]
struct ScanEntry<'a> {
    name: Option<&'a str>,
    identifier: &'a str,
    rssi: Option<i16>,
    configured: bool,
}

fn entries<'a>(devices: &'a [DiscoveredDevice], allow_list: &AllowList) -> Vec<ScanEntry<'a>> {
    devices
        .iter()
        .map(|device| ScanEntry {
            name: device.name.as_deref(),
            identifier: &device.identifier,
            rssi: device.rssi,
            configured: device
                .name
                .as_deref()
                .is_some_and(|name| allow_list.contains(name)),
        })
        .collect()
}

fn format_text(entries: &[ScanEntry<'_>]) -> String {
    let mut out = format!("Found {} device(s)\n", entries.len());
    for entry in entries {
        out.push_str(&format!(
            "{} {:<24} {:<38} {}\n",
            if entry.configured { "*" } else { " " },
            entry.name.unwrap_or("Unknown"),
            entry.identifier,
            entry
                .rssi
                .map(|rssi| format!("{} dBm", rssi))
                .unwrap_or_default(),
        ));
    }
    out
}

pub async fn cmd_scan(timeout: u64, format: OutputFormat, allow_list: &AllowList) -> Result<()> {
    let options = ScanOptions::default().duration(Duration::from_secs(timeout));
    let mut devices = scan_with_options(options)
        .await
        .context("Failed to scan for devices")?;
    devices.sort_by(|a, b| b.rssi.cmp(&a.rssi));

    let entries = entries(&devices, allow_list);
    let content = match format {
        OutputFormat::Text => format_text(&entries),
        OutputFormat::Json => serde_json::to_string_pretty(&entries)?,
    };
    print!("{}", content);
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}
