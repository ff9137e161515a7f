//! btleplug-backed camera link.
//!
//! [`BleCamera`] wraps one discovered peripheral and implements
//! [`CameraLink`]. It is created unconnected by
//! [`BleTransport`](crate::scan::BleTransport) and opened by the link manager.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::traits::{CameraLink, NotificationStream};

/// Default timeout for BLE characteristic write operations.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE connection operations.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for BLE connection timeouts.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use camsync_core::device::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connection_timeout(Duration::from_secs(20))
///     .write_timeout(Duration::from_secs(5));
/// assert_eq!(config.connection_timeout, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for BLE write operations.
    pub write_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }
}

/// A camera reachable over Bluetooth Low Energy.
///
/// This struct intentionally does not implement `Clone`: it owns the
/// characteristic cache for one connection. Share it with `Arc` if needed.
pub struct BleCamera {
    /// Kept alive for the lifetime of the peripheral; some backends
    /// invalidate peripherals when their adapter is dropped.
    #[allow(dead_code)]
    adapter: Adapter,
    peripheral: Peripheral,
    name: String,
    address: String,
    /// Characteristics by UUID, rebuilt after every service discovery.
    characteristics_cache: RwLock<HashMap<Uuid, Characteristic>>,
    config: ConnectionConfig,
}

impl std::fmt::Debug for BleCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleCamera")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl BleCamera {
    /// Wrap a discovered, not yet connected peripheral.
    pub fn new(
        adapter: Adapter,
        peripheral: Peripheral,
        name: String,
        address: String,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            adapter,
            peripheral,
            name,
            address,
            characteristics_cache: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the current connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn rebuild_cache(&self) {
        let services = self.peripheral.services();
        debug!("Found {} services", services.len());

        let mut cache = self.characteristics_cache.write().await;
        cache.clear();
        for service in &services {
            for char in &service.characteristics {
                cache.insert(char.uuid, char.clone());
            }
        }
        debug!("Cached {} characteristics", cache.len());
    }

    /// Find a characteristic by UUID, preferring the cache built at connect.
    async fn find_characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        {
            let cache = self.characteristics_cache.read().await;
            if let Some(char) = cache.get(&uuid) {
                return Ok(char.clone());
            }
            if !cache.is_empty() {
                return Err(Error::characteristic_not_found(
                    uuid.to_string(),
                    self.peripheral.services().len(),
                ));
            }
        }

        warn!(
            "Characteristics cache empty, falling back to service search for {}",
            uuid
        );
        let services = self.peripheral.services();
        services
            .iter()
            .flat_map(|service| service.characteristics.iter())
            .find(|char| char.uuid == uuid)
            .cloned()
            .ok_or_else(|| Error::characteristic_not_found(uuid.to_string(), services.len()))
    }
}

#[async_trait]
impl CameraLink for BleCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    #[tracing::instrument(level = "info", skip(self), fields(camera = %self.name))]
    async fn connect(&self) -> Result<()> {
        if !self.is_connected().await {
            info!("Connecting to camera...");
            timeout(self.config.connection_timeout, self.peripheral.connect())
                .await
                .map_err(|_| Error::timeout("connect to camera", self.config.connection_timeout))??;
        }

        timeout(
            self.config.discovery_timeout,
            self.peripheral.discover_services(),
        )
        .await
        .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout))??;

        self.rebuild_cache().await;
        info!("Connected");
        Ok(())
    }

    #[tracing::instrument(level = "info", skip(self), fields(camera = %self.name))]
    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        if !self.is_connected().await {
            return Err(Error::NotConnected);
        }
        let char = self.find_characteristic(characteristic).await?;
        timeout(
            self.config.write_timeout,
            self.peripheral.write(&char, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| {
            Error::timeout(
                format!("write characteristic {}", characteristic),
                self.config.write_timeout,
            )
        })??;
        debug!(camera = %self.name, %characteristic, ?data, "Wrote");
        Ok(())
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<NotificationStream> {
        let char = self.find_characteristic(characteristic).await?;
        self.peripheral.subscribe(&char).await?;

        let stream = self.peripheral.notifications().await?;
        let filtered = stream.filter_map(move |notification| async move {
            (notification.uuid == characteristic).then_some(notification.value)
        });
        Ok(Box::pin(filtered))
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        let char = self.find_characteristic(characteristic).await?;
        self.peripheral.unsubscribe(&char).await?;
        Ok(())
    }
}
