//! Mock cameras for testing without BLE hardware.
//!
//! [`MockCamera`] implements [`CameraLink`] and answers keep-alive writes
//! with a notification, the way real firmware does. [`MockTransport`]
//! "discovers" a fixed set of mock cameras.
//!
//! # Features
//!
//! - **Failure injection**: refuse connections, fail writes or subscriptions
//! - **Acknowledgment modes**: valid, invalid, or no keep-alive answer at all
//! - **Link drops**: simulate a camera going out of range mid-session
//! - **Latency simulation**: delay writes or connects to exercise timeouts
//! - **Write log**: every successful write is recorded for assertions

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use uuid::Uuid;

use camsync_types::protocol::{KEEP_ALIVE, KEEP_ALIVE_ACK, KEEP_ALIVE_ID};
use camsync_types::uuid::{RESPONSE, SETTING};

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::scan::match_allow_list;
use crate::traits::{CameraLink, NotificationStream, Transport};

/// How a mock camera answers a keep-alive write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Notify `02 5B 00`.
    #[default]
    Valid,
    /// Notify `02 5B 01` (setting rejected).
    Invalid,
    /// Never notify.
    Silent,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A mock camera for testing.
pub struct MockCamera {
    name: String,
    address: String,
    connected: AtomicBool,
    /// Whether the camera advertises and accepts connections.
    reachable: AtomicBool,
    remaining_connect_failures: AtomicU32,
    connect_attempts: AtomicU32,
    disconnect_calls: AtomicU32,
    fail_writes: AtomicBool,
    fail_subscribe: AtomicBool,
    write_latency_ms: AtomicU64,
    connect_latency_ms: AtomicU64,
    ack_mode: Mutex<AckMode>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    notifier: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl std::fmt::Debug for MockCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCamera")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockCamera {
    /// Create a reachable, disconnected mock camera.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            address: format!("MOCK-{:06X}", rand::random::<u32>() % 0xFFFFFF),
            connected: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            remaining_connect_failures: AtomicU32::new(0),
            connect_attempts: AtomicU32::new(0),
            disconnect_calls: AtomicU32::new(0),
            fail_writes: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            write_latency_ms: AtomicU64::new(0),
            connect_latency_ms: AtomicU64::new(0),
            ack_mode: Mutex::new(AckMode::Valid),
            writes: Mutex::new(Vec::new()),
            notifier: Mutex::new(None),
        }
    }

    /// Create a mock camera already wrapped in `Arc` for sharing.
    pub fn shared(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Choose how keep-alive writes are answered.
    pub fn set_ack_mode(&self, mode: AckMode) {
        *lock(&self.ack_mode) = mode;
    }

    /// Make every write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Make notification subscription fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::Relaxed);
    }

    /// Fail the next `count` connection attempts.
    pub fn fail_next_connects(&self, count: u32) {
        self.remaining_connect_failures
            .store(count, Ordering::Relaxed);
    }

    /// Control whether the camera advertises and accepts connections.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Relaxed);
    }

    /// Delay every write by `latency`.
    pub fn set_write_latency(&self, latency: Duration) {
        self.write_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Delay every connection attempt by `latency`.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Simulate the link dropping without a disconnect from our side.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::Relaxed);
        lock(&self.notifier).take();
    }

    /// Push an unsolicited notification to the current subscriber.
    pub fn notify(&self, payload: &[u8]) -> bool {
        lock(&self.notifier)
            .as_ref()
            .is_some_and(|tx| tx.unbounded_send(payload.to_vec()).is_ok())
    }

    /// Whether the mock link is up.
    pub fn is_connected_sync(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Number of `connect()` calls so far.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Number of `disconnect()` calls so far.
    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::Relaxed)
    }

    /// All successful writes, in order.
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        lock(&self.writes).clone()
    }

    /// How many successful writes carried exactly `opcode`.
    pub fn count_writes(&self, opcode: &[u8]) -> usize {
        lock(&self.writes)
            .iter()
            .filter(|(_, data)| data.as_slice() == opcode)
            .count()
    }

    fn answer_keep_alive(&self) {
        let payload: Option<[u8; 3]> = match *lock(&self.ack_mode) {
            AckMode::Valid => Some(KEEP_ALIVE_ACK),
            AckMode::Invalid => Some([0x02, KEEP_ALIVE_ID, 0x01]),
            AckMode::Silent => None,
        };
        if let Some(payload) = payload {
            self.notify(&payload);
        }
    }
}

#[async_trait]
impl CameraLink for MockCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn is_connected(&self) -> bool {
        self.is_connected_sync()
    }

    async fn connect(&self) -> Result<()> {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        let latency = self.connect_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.remaining_connect_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_connect_failures
                .fetch_sub(1, Ordering::Relaxed);
            return Err(Error::device_not_found(&self.name));
        }
        if !self.reachable.load(Ordering::Relaxed) {
            return Err(Error::device_not_found(&self.name));
        }

        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        lock(&self.notifier).take();
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let latency = self.write_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if !self.is_connected_sync() {
            return Err(Error::NotConnected);
        }
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(Error::write_failed(
                characteristic.to_string(),
                "mock failure",
            ));
        }

        lock(&self.writes).push((characteristic, data.to_vec()));
        if characteristic == SETTING && data == KEEP_ALIVE {
            self.answer_keep_alive();
        }
        Ok(())
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<NotificationStream> {
        if !self.is_connected_sync() {
            return Err(Error::NotConnected);
        }
        if characteristic != RESPONSE || self.fail_subscribe.load(Ordering::Relaxed) {
            return Err(Error::characteristic_not_found(characteristic.to_string(), 1));
        }

        let (tx, rx) = mpsc::unbounded();
        *lock(&self.notifier) = Some(tx);
        Ok(Box::pin(rx))
    }

    async fn unsubscribe(&self, _characteristic: Uuid) -> Result<()> {
        if !self.is_connected_sync() {
            return Err(Error::NotConnected);
        }
        lock(&self.notifier).take();
        Ok(())
    }
}

/// A transport that "discovers" a fixed set of mock cameras.
///
/// Cloning shares the cameras and the scan counter, so a test can keep one
/// handle while another is moved into a worker.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    cameras: Vec<Arc<MockCamera>>,
    scans: Arc<AtomicU32>,
    fail_scan: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a transport over the given cameras.
    pub fn new(cameras: Vec<Arc<MockCamera>>) -> Self {
        Self {
            cameras,
            ..Default::default()
        }
    }

    /// Create a transport with one fresh camera per name.
    pub fn with_names(names: &[&str]) -> Self {
        Self::new(names.iter().map(|name| MockCamera::shared(name)).collect())
    }

    /// Get a camera by name.
    pub fn camera(&self, name: &str) -> Option<Arc<MockCamera>> {
        self.cameras.iter().find(|c| c.name == name).cloned()
    }

    /// All cameras.
    pub fn cameras(&self) -> &[Arc<MockCamera>] {
        &self.cameras
    }

    /// Number of scans performed.
    pub fn scan_count(&self) -> u32 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Make scans fail outright.
    pub fn set_fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn discover(&self, names: &[String]) -> Result<Vec<Box<dyn CameraLink>>> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        if self.fail_scan.load(Ordering::Relaxed) {
            return Err(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter));
        }

        let seen = self
            .cameras
            .iter()
            .filter(|c| c.reachable.load(Ordering::Relaxed))
            .map(|c| (c.name.clone(), Arc::clone(c)))
            .collect();

        Ok(match_allow_list(names, seen)
            .into_iter()
            .map(|(_, camera)| Box::new(camera) as Box<dyn CameraLink>)
            .collect())
    }
}
