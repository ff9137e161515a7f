//! Session configuration.
//!
//! [`SessionConfig`] gathers every tunable of one recording session and
//! hands out the option structs each component takes. All fields have
//! defaults, so an empty TOML table is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::ConnectionConfig;
use crate::error::{Error, Result};
use crate::link::LinkOptions;
use crate::reconnect::ReconnectOptions;
use crate::scan::{BleTransport, ScanOptions};
use crate::trigger::TriggerOptions;
use crate::util::normalize_name;
use crate::worker::WorkerOptions;

/// Default substring that marks a recorded schedule stage.
pub const DEFAULT_KEYWORD: &str = "(recording)";

/// Configuration for one recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Advertised names of the cameras to control.
    pub device_names: Vec<String>,
    /// Substring in a stage title that means "record this stage".
    pub keyword: String,
    /// Grace period before a stop is sent, in seconds.
    pub stop_delay_secs: u64,
    /// Keep-alive interval in seconds.
    pub keep_alive_interval_secs: u64,
    /// How long to wait for each keep-alive acknowledgment, in milliseconds.
    pub ack_timeout_ms: u64,
    /// Reconnect attempts per keep-alive round.
    pub reconnect_attempts: u32,
    /// Delay between reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Upper bound for one reconnect attempt, in milliseconds.
    pub reconnect_timeout_ms: u64,
    /// BLE scan duration, in seconds.
    pub scan_secs: u64,
    /// Per-camera connection timeout, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_names: Vec::new(),
            keyword: DEFAULT_KEYWORD.to_string(),
            stop_delay_secs: 5,
            keep_alive_interval_secs: 10,
            ack_timeout_ms: 3000,
            reconnect_attempts: 2,
            reconnect_delay_ms: 1000,
            reconnect_timeout_ms: 5000,
            scan_secs: 5,
            connect_timeout_secs: 15,
        }
    }
}

impl SessionConfig {
    /// Check the values that would make the session misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.keyword.is_empty() {
            return Err(Error::invalid_config("keyword must not be empty"));
        }
        if self.keep_alive_interval_secs == 0 {
            return Err(Error::invalid_config(
                "keep_alive_interval_secs must be > 0",
            ));
        }
        if self.ack_timeout_ms == 0 {
            return Err(Error::invalid_config("ack_timeout_ms must be > 0"));
        }
        if self.scan_secs == 0 {
            return Err(Error::invalid_config("scan_secs must be > 0"));
        }
        self.reconnect_options().validate()
    }

    /// The allow-list built from `device_names`.
    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.device_names.iter().cloned())
    }

    /// Reconnect policy.
    pub fn reconnect_options(&self) -> ReconnectOptions {
        ReconnectOptions::default()
            .max_attempts(self.reconnect_attempts)
            .delay(Duration::from_millis(self.reconnect_delay_ms))
            .attempt_timeout(Duration::from_millis(self.reconnect_timeout_ms))
    }

    /// Options for the link manager.
    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            reconnect: self.reconnect_options(),
        }
    }

    /// Options for the command worker.
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            keep_alive_interval: Duration::from_secs(self.keep_alive_interval_secs),
            ..WorkerOptions::default()
        }
    }

    /// Options for the trigger state machine.
    pub fn trigger_options(&self) -> TriggerOptions {
        TriggerOptions {
            keyword: self.keyword.clone(),
            stop_delay: Duration::from_secs(self.stop_delay_secs),
            ..TriggerOptions::default()
        }
    }

    /// A BLE transport using the configured scan and connect timeouts.
    pub fn ble_transport(&self) -> BleTransport {
        BleTransport::new(
            ScanOptions::default().duration(Duration::from_secs(self.scan_secs)),
            ConnectionConfig::default()
                .connection_timeout(Duration::from_secs(self.connect_timeout_secs)),
        )
    }
}

/// Ordered, duplicate-free set of camera names.
///
/// Built once before a worker starts and never changed while it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList(Vec<String>);

impl AllowList {
    /// Build an allow-list, trimming names and dropping blanks and repeats.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for name in names {
            let name = normalize_name(name.as_ref());
            if !name.is_empty() && !list.iter().any(|n| n == name) {
                list.push(name.to_string());
            }
        }
        Self(list)
    }

    /// Names in configuration order.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no names.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `name` is allow-listed.
    pub fn contains(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.0.iter().any(|n| n == name)
    }
}

/// Parse a device-names file: one advertised name per line.
pub fn parse_device_names(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(normalize_name)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load a device-names file.
pub fn load_device_names(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_device_names(&contents))
}
