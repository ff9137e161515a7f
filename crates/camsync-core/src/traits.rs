//! Trait abstractions over camera links and discovery.
//!
//! [`CameraLink`] covers a single camera; [`Transport`] finds cameras by
//! advertised name. Both are implemented for real hardware (btleplug) and
//! for the in-memory mocks used in tests, so the
//! [`LinkManager`](crate::link::LinkManager) never knows which one it drives.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::error::Result;

/// Stream of raw notification payloads from one characteristic.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Operations on one camera peripheral.
///
/// Methods take `&self`; implementations keep their connection state behind
/// interior mutability so a link can be shared with notification tasks.
#[async_trait]
pub trait CameraLink: Send + Sync {
    /// Advertised name (the allow-list key).
    fn name(&self) -> &str;

    /// Address or platform identifier.
    ///
    /// On Linux/Windows this is the MAC address; on macOS a UUID.
    fn address(&self) -> &str;

    /// Whether the link currently reports as connected.
    async fn is_connected(&self) -> bool;

    /// Open (or re-open) the link, discovering services as needed.
    async fn connect(&self) -> Result<()>;

    /// Close the link.
    async fn disconnect(&self) -> Result<()>;

    /// Write `data` to `characteristic` with a protocol-level response.
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()>;

    /// Enable notifications on `characteristic` and return their payloads.
    async fn subscribe(&self, characteristic: Uuid) -> Result<NotificationStream>;

    /// Disable notifications on `characteristic`.
    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()>;
}

#[async_trait]
impl<T: CameraLink + ?Sized> CameraLink for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn address(&self) -> &str {
        (**self).address()
    }

    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }

    async fn connect(&self) -> Result<()> {
        (**self).connect().await
    }

    async fn disconnect(&self) -> Result<()> {
        (**self).disconnect().await
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        (**self).write(characteristic, data).await
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<NotificationStream> {
        (**self).subscribe(characteristic).await
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        (**self).unsubscribe(characteristic).await
    }
}

/// Discovery of cameras by advertised name.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Scan and return one unconnected link per allow-listed name that was
    /// seen, in allow-list order. Names that were not seen are skipped.
    async fn discover(&self, names: &[String]) -> Result<Vec<Box<dyn CameraLink>>>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn discover(&self, names: &[String]) -> Result<Vec<Box<dyn CameraLink>>> {
        (**self).discover(names).await
    }
}
