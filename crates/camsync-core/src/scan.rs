//! Camera discovery by advertised name.
//!
//! Cameras are identified only by the name they advertise. A scan runs for a
//! fixed duration, then every known peripheral is matched against the
//! allow-list.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::device::{BleCamera, ConnectionConfig};
use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::traits::{CameraLink, Transport};
use crate::util::{create_identifier, normalize_name};

/// Information about a device seen during a scan.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// The advertised name, if any.
    pub name: Option<String>,
    /// Connection identifier (peripheral ID on macOS, address elsewhere).
    pub identifier: String,
    /// RSSI signal strength.
    pub rssi: Option<i16>,
}

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to scan for devices.
    pub duration: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
        }
    }
}

impl ScanOptions {
    /// Set the scan duration.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Run one scan on `adapter` and return every peripheral it knows about.
async fn scan_peripherals(adapter: &Adapter, options: &ScanOptions) -> Result<Vec<Peripheral>> {
    info!(
        "Starting BLE scan for {} seconds...",
        options.duration.as_secs()
    );
    adapter.start_scan(ScanFilter::default()).await?;
    sleep(options.duration).await;
    adapter.stop_scan().await?;
    Ok(adapter.peripherals().await?)
}

/// Scan for all nearby BLE devices.
///
/// Used by the CLI to show what is in range; the link manager goes through
/// [`BleTransport`] instead.
pub async fn scan_with_options(options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    let peripherals = scan_peripherals(&adapter, &options).await?;

    let mut discovered = Vec::new();
    for peripheral in peripherals {
        match peripheral.properties().await {
            Ok(Some(props)) => discovered.push(DiscoveredDevice {
                name: props.local_name.clone(),
                identifier: create_identifier(&props.address.to_string(), &peripheral.id()),
                rssi: props.rssi,
            }),
            Ok(None) => {}
            Err(e) => debug!("Error processing peripheral: {}", e),
        }
    }

    info!("Scan complete. Found {} device(s)", discovered.len());
    Ok(discovered)
}

/// Pick one entry per allow-listed name, in allow-list order.
///
/// `seen` pairs an advertised name with whatever identifies the device. The
/// first device advertising a name wins; later duplicates are ignored.
pub fn match_allow_list<T>(names: &[String], seen: Vec<(String, T)>) -> Vec<(String, T)> {
    let mut seen: Vec<Option<(String, T)>> = seen.into_iter().map(Some).collect();
    let mut matched = Vec::new();

    for wanted in names {
        let wanted = normalize_name(wanted);
        let hit = seen
            .iter_mut()
            .find(|entry| matches!(entry, Some((name, _)) if normalize_name(name) == wanted));
        match hit.and_then(Option::take) {
            Some(entry) => matched.push(entry),
            None => warn!("Camera '{}' not found", wanted),
        }
    }

    matched
}

/// Discovers cameras with the system Bluetooth adapter.
#[derive(Debug, Clone, Default)]
pub struct BleTransport {
    scan_options: ScanOptions,
    connection_config: ConnectionConfig,
}

impl BleTransport {
    /// Create a transport with explicit scan and connection settings.
    pub fn new(scan_options: ScanOptions, connection_config: ConnectionConfig) -> Self {
        Self {
            scan_options,
            connection_config,
        }
    }
}

#[async_trait]
impl Transport for BleTransport {
    #[tracing::instrument(level = "info", skip(self))]
    async fn discover(&self, names: &[String]) -> Result<Vec<Box<dyn CameraLink>>> {
        let adapter = get_adapter().await?;
        let peripherals = scan_peripherals(&adapter, &self.scan_options).await?;

        let mut seen = Vec::new();
        for peripheral in peripherals {
            if let Ok(Some(props)) = peripheral.properties().await
                && let Some(name) = props.local_name.clone()
            {
                let address = create_identifier(&props.address.to_string(), &peripheral.id());
                seen.push((name, (address, peripheral)));
            }
        }

        let matched = match_allow_list(names, seen);
        info!("Matched {}/{} camera(s)", matched.len(), names.len());

        Ok(matched
            .into_iter()
            .map(|(name, (address, peripheral))| {
                info!("Found camera: {}, {}", name, address);
                Box::new(BleCamera::new(
                    adapter.clone(),
                    peripheral,
                    name,
                    address,
                    self.connection_config.clone(),
                )) as Box<dyn CameraLink>
            })
            .collect())
    }
}
