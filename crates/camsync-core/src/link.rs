//! Fleet-level control of the allow-listed cameras.
//!
//! The [`LinkManager`] owns every camera link of one session. Each operation
//! fans out to the whole fleet and reports how many cameras completed it;
//! a single camera failing never fails the operation as a whole.
//!
//! Keep-alive acknowledgments arrive as notifications. Every subscribed
//! camera gets a forwarder task that tags its payloads with the camera
//! address and feeds one shared channel; the manager dispatches them to a
//! per-address [`NotificationSlot`] while it waits.

use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use camsync_types::protocol::{Verb, parse_keep_alive_ack};
use camsync_types::uuid::RESPONSE;

use crate::config::AllowList;
use crate::error::Result;
use crate::reconnect::{ReconnectOptions, reconnect};
use crate::traits::{CameraLink, Transport};

/// Default time to wait for a keep-alive acknowledgment.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Options for the link manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// How long to wait for each camera's keep-alive acknowledgment.
    pub ack_timeout: Duration,
    /// Reconnect policy for dropped links.
    pub reconnect: ReconnectOptions,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            reconnect: ReconnectOptions::default(),
        }
    }
}

/// Correlation state for one camera's notifications.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationSlot {
    /// A keep-alive is waiting for this camera's answer.
    pub awaiting: bool,
    /// An answer arrived since the slot was armed.
    pub signalled: bool,
    /// Most recent payload received from the camera.
    pub last_payload: Option<Vec<u8>>,
}

impl NotificationSlot {
    /// Prepare for a new acknowledgment.
    fn arm(&mut self) {
        self.awaiting = true;
        self.signalled = false;
        self.last_payload = None;
    }

    fn deliver(&mut self, payload: Vec<u8>) {
        if self.awaiting {
            self.awaiting = false;
            self.signalled = true;
        }
        self.last_payload = Some(payload);
    }
}

/// A camera currently in the fleet.
struct Tracked {
    link: Box<dyn CameraLink>,
    forwarder: Option<JoinHandle<()>>,
}

impl Tracked {
    fn stop_forwarder(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
    }
}

type Tagged = (String, Vec<u8>);

/// Subscribe to `link`'s responses and forward them, tagged, into `tx`.
async fn spawn_forwarder(
    link: &dyn CameraLink,
    tx: mpsc::UnboundedSender<Tagged>,
) -> Result<JoinHandle<()>> {
    let mut stream = link.subscribe(RESPONSE).await?;
    let address = link.address().to_string();
    Ok(tokio::spawn(async move {
        while let Some(payload) = stream.next().await {
            if tx.send((address.clone(), payload)).is_err() {
                break;
            }
        }
        debug!("Notification stream for {} ended", address);
    }))
}

/// Owns the camera fleet of one worker run.
///
/// Not `Sync`, and not meant to be: the command worker is its only user.
pub struct LinkManager {
    transport: Box<dyn Transport>,
    allow_list: AllowList,
    options: LinkOptions,
    fleet: Vec<Tracked>,
    slots: HashMap<String, NotificationSlot>,
    notify_tx: mpsc::UnboundedSender<Tagged>,
    notify_rx: mpsc::UnboundedReceiver<Tagged>,
    recording: bool,
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("allow_list", &self.allow_list)
            .field("fleet", &self.tracked_names())
            .field("recording", &self.recording)
            .finish_non_exhaustive()
    }
}

impl LinkManager {
    /// Create a manager with an empty fleet.
    pub fn new(transport: Box<dyn Transport>, allow_list: AllowList, options: LinkOptions) -> Self {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            allow_list,
            options,
            fleet: Vec::new(),
            slots: HashMap::new(),
            notify_tx,
            notify_rx,
            recording: false,
        }
    }

    /// The configured allow-list.
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Number of tracked cameras.
    pub fn fleet_size(&self) -> usize {
        self.fleet.len()
    }

    /// Names of the tracked cameras, in the order they were added.
    pub fn tracked_names(&self) -> Vec<String> {
        self.fleet.iter().map(|t| t.link.name().to_string()).collect()
    }

    /// Whether the fleet was last told to record.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Record whether the fleet is recording.
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    /// The notification slot of the camera at `address`, if tracked.
    pub fn slot(&self, address: &str) -> Option<&NotificationSlot> {
        self.slots.get(address)
    }

    /// Discover, connect and subscribe the allow-listed cameras.
    ///
    /// Returns the success count of the initial keep-alive round. When every
    /// allow-listed camera is already tracked this returns the fleet size
    /// without scanning.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn connect(&mut self) -> usize {
        if !self.fleet.is_empty() && self.fleet.len() >= self.allow_list.len() {
            info!("All {} camera(s) already connected", self.fleet.len());
            return self.fleet.len();
        }
        if self.allow_list.is_empty() {
            warn!("No camera names configured");
            return 0;
        }

        let tracked = self.tracked_names();
        let wanted: Vec<String> = self
            .allow_list
            .names()
            .iter()
            .filter(|name| !tracked.contains(name))
            .cloned()
            .collect();

        let links = match self.transport.discover(&wanted).await {
            Ok(links) => links,
            Err(e) => {
                warn!("Scan failed: {}", e);
                Vec::new()
            }
        };

        for link in links {
            if let Err(e) = link.connect().await {
                warn!("Failed to connect to {}: {}", link.name(), e);
                continue;
            }
            self.track(link).await;
        }

        if self.fleet.is_empty() {
            warn!("No cameras connected");
            return 0;
        }
        info!(
            "Tracking {}/{} camera(s)",
            self.fleet.len(),
            self.allow_list.len()
        );
        self.send_keep_alive().await
    }

    /// Subscribe a freshly connected link and add it to the fleet.
    async fn track(&mut self, link: Box<dyn CameraLink>) {
        match spawn_forwarder(link.as_ref(), self.notify_tx.clone()).await {
            Ok(handle) => {
                info!("Connected to {}", link.name());
                self.slots
                    .insert(link.address().to_string(), NotificationSlot::default());
                self.fleet.push(Tracked {
                    link,
                    forwarder: Some(handle),
                });
            }
            Err(e) => {
                warn!("Failed to subscribe to {}: {}", link.name(), e);
                if let Err(e) = link.disconnect().await {
                    debug!("Closing {} failed: {}", link.name(), e);
                }
            }
        }
    }

    /// True when the fleet is non-empty and every tracked link is up.
    pub async fn is_connected(&self) -> bool {
        if self.fleet.is_empty() {
            return false;
        }
        for tracked in &self.fleet {
            if !tracked.link.is_connected().await {
                return false;
            }
        }
        true
    }

    /// Send the start opcode to every tracked camera.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn start_recording(&mut self) -> usize {
        self.fan_out(Verb::StartRecording).await
    }

    /// Send the stop opcode to every tracked camera.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn stop_recording(&mut self) -> usize {
        self.fan_out(Verb::StopRecording).await
    }

    async fn fan_out(&self, verb: Verb) -> usize {
        let mut count = 0;
        for tracked in &self.fleet {
            let link = &tracked.link;
            match link.write(verb.characteristic(), verb.opcode()).await {
                Ok(()) => {
                    info!("{}: {}", link.name(), verb);
                    count += 1;
                }
                Err(e) => warn!("{}: {} failed: {}", link.name(), verb, e),
            }
        }
        info!("{}: {}/{} ok", verb, count, self.fleet.len());
        count
    }

    /// Run one keep-alive round.
    ///
    /// Dropped links are reconnected first. A camera that does not answer
    /// counts as a failure for this round but stays in the fleet.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn send_keep_alive(&mut self) -> usize {
        let mut count = 0;
        for index in 0..self.fleet.len() {
            if !self.fleet[index].link.is_connected().await && !self.revive(index).await {
                continue;
            }
            if self.ping(index).await {
                count += 1;
            }
        }
        if count < self.fleet.len() {
            warn!("Keep-alive: {}/{} ok", count, self.fleet.len());
        } else {
            debug!("Keep-alive: {}/{} ok", count, self.fleet.len());
        }
        count
    }

    /// Reconnect the camera at `index` and subscribe it again.
    async fn revive(&mut self, index: usize) -> bool {
        if !reconnect(self.fleet[index].link.as_ref(), &self.options.reconnect).await {
            return false;
        }
        let tracked = &mut self.fleet[index];
        tracked.stop_forwarder();
        match spawn_forwarder(tracked.link.as_ref(), self.notify_tx.clone()).await {
            Ok(handle) => {
                tracked.forwarder = Some(handle);
                true
            }
            Err(e) => {
                warn!("Failed to resubscribe to {}: {}", tracked.link.name(), e);
                false
            }
        }
    }

    /// Write a keep-alive to the camera at `index` and wait for its answer.
    async fn ping(&mut self, index: usize) -> bool {
        self.drain_notifications();

        let address = self.fleet[index].link.address().to_string();
        self.slots.entry(address.clone()).or_default().arm();

        let link = &self.fleet[index].link;
        let verb = Verb::KeepAlive;
        if let Err(e) = link.write(verb.characteristic(), verb.opcode()).await {
            warn!("{}: keep-alive write failed: {}", link.name(), e);
            if let Some(slot) = self.slots.get_mut(&address) {
                slot.awaiting = false;
            }
            return false;
        }

        let name = link.name().to_string();
        match self.await_ack(&address).await {
            Some(payload) => match parse_keep_alive_ack(payload.as_deref()) {
                Ok(()) => {
                    debug!("{}: keep-alive acknowledged", name);
                    true
                }
                Err(e) => {
                    warn!("{}: invalid keep-alive response: {}", name, e);
                    false
                }
            },
            None => {
                warn!(
                    "{}: no keep-alive response within {:?}",
                    name, self.options.ack_timeout
                );
                false
            }
        }
    }

    /// Wait until the slot for `address` is signalled.
    ///
    /// Returns the received payload, or `None` on timeout. Notifications for
    /// other cameras are dispatched to their own slots along the way.
    async fn await_ack(&mut self, address: &str) -> Option<Option<Vec<u8>>> {
        let deadline = Instant::now() + self.options.ack_timeout;
        loop {
            if let Some(slot) = self.slots.get(address)
                && slot.signalled
            {
                return Some(slot.last_payload.clone());
            }
            match timeout_at(deadline, self.notify_rx.recv()).await {
                Ok(Some((from, payload))) => self.dispatch(&from, payload),
                Ok(None) | Err(_) => {
                    if let Some(slot) = self.slots.get_mut(address) {
                        slot.awaiting = false;
                    }
                    return None;
                }
            }
        }
    }

    fn drain_notifications(&mut self) {
        while let Ok((from, payload)) = self.notify_rx.try_recv() {
            self.dispatch(&from, payload);
        }
    }

    fn dispatch(&mut self, address: &str, payload: Vec<u8>) {
        match self.slots.get_mut(address) {
            Some(slot) => {
                debug!(%address, ?payload, "Notification");
                slot.deliver(payload);
            }
            None => debug!(%address, "Notification from untracked camera dropped"),
        }
    }

    /// Close every link and forget the fleet.
    ///
    /// Stops recording first when the fleet is recording. Returns how many
    /// links closed without error.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn disconnect(&mut self) -> usize {
        if self.recording {
            info!("Stopping recording before disconnect");
            self.stop_recording().await;
        }

        let mut closed = 0;
        for mut tracked in self.fleet.drain(..) {
            let link = &tracked.link;
            if let Err(e) = link.unsubscribe(RESPONSE).await {
                debug!("{}: unsubscribe failed: {}", link.name(), e);
            }
            tracked.stop_forwarder();
            match tracked.link.disconnect().await {
                Ok(()) => {
                    info!("Disconnected from {}", tracked.link.name());
                    closed += 1;
                }
                Err(e) => warn!("{}: disconnect failed: {}", tracked.link.name(), e),
            }
        }

        self.slots.clear();
        while self.notify_rx.try_recv().is_ok() {}
        self.recording = false;
        closed
    }
}

impl Drop for LinkManager {
    fn drop(&mut self) {
        for tracked in &mut self.fleet {
            tracked.stop_forwarder();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{AckMode, MockTransport};
    use camsync_types::protocol::{KEEP_ALIVE, START_RECORDING, STOP_RECORDING};

    fn manager(transport: &MockTransport, names: &[&str]) -> LinkManager {
        LinkManager::new(
            Box::new(transport.clone()),
            AllowList::new(names.iter().copied()),
            LinkOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_connect_full_fleet() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);

        assert_eq!(links.connect().await, 2);
        assert_eq!(links.fleet_size(), 2);
        assert!(links.is_connected().await);
        assert_eq!(links.tracked_names(), vec!["GoPro A", "GoPro B"]);

        for camera in transport.cameras() {
            assert_eq!(camera.count_writes(&KEEP_ALIVE), 1);
        }
    }

    #[tokio::test]
    async fn test_connect_twice_skips_scan() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);

        assert_eq!(links.connect().await, 2);
        assert_eq!(links.connect().await, 2);
        assert_eq!(transport.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_partial_discovery_rescans_missing() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        let b = transport.camera("GoPro B").unwrap();
        b.set_reachable(false);
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);

        assert_eq!(links.connect().await, 1);
        assert!(links.is_connected().await);

        b.set_reachable(true);
        assert_eq!(links.connect().await, 2);
        assert_eq!(links.fleet_size(), 2);
        assert_eq!(transport.scan_count(), 2);
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let transport = MockTransport::with_names(&["Speaker"]);
        let mut links = manager(&transport, &["GoPro A"]);

        assert_eq!(links.connect().await, 0);
        assert!(!links.is_connected().await);
    }

    #[tokio::test]
    async fn test_scan_error_is_zero_count() {
        let transport = MockTransport::with_names(&["GoPro A"]);
        transport.set_fail_scan(true);
        let mut links = manager(&transport, &["GoPro A"]);

        assert_eq!(links.connect().await, 0);
    }

    #[tokio::test]
    async fn test_connect_failure_excludes_camera() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        transport.camera("GoPro A").unwrap().fail_next_connects(1);
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);

        assert_eq!(links.connect().await, 1);
        assert_eq!(links.tracked_names(), vec!["GoPro B"]);
    }

    #[tokio::test]
    async fn test_subscribe_failure_closes_camera() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        let a = transport.camera("GoPro A").unwrap();
        a.set_fail_subscribe(true);
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);

        assert_eq!(links.connect().await, 1);
        assert_eq!(links.fleet_size(), 1);
        assert_eq!(a.disconnect_calls(), 1);
        assert!(!a.is_connected_sync());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_camera_counts_as_failure() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        transport
            .camera("GoPro B")
            .unwrap()
            .set_ack_mode(AckMode::Silent);
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);

        let start = Instant::now();
        assert_eq!(links.connect().await, 1);
        assert!(start.elapsed() >= DEFAULT_ACK_TIMEOUT);
        // still tracked and still reported as connected
        assert_eq!(links.fleet_size(), 2);
        assert!(links.is_connected().await);
    }

    #[tokio::test]
    async fn test_invalid_ack_counts_as_failure() {
        let transport = MockTransport::with_names(&["GoPro A"]);
        let a = transport.camera("GoPro A").unwrap();
        let mut links = manager(&transport, &["GoPro A"]);
        assert_eq!(links.connect().await, 1);

        a.set_ack_mode(AckMode::Invalid);
        assert_eq!(links.send_keep_alive().await, 0);
        let slot = links.slot(a.address()).unwrap();
        assert_eq!(slot.last_payload, Some(vec![0x02, 0x5B, 0x01]));
        assert!(!slot.awaiting);
    }

    #[tokio::test]
    async fn test_stale_notification_is_not_an_ack() {
        let transport = MockTransport::with_names(&["GoPro A"]);
        let a = transport.camera("GoPro A").unwrap();
        let mut links = manager(&transport, &["GoPro A"]);
        assert_eq!(links.connect().await, 1);

        a.notify(&[0x02, 0x5B, 0x00]);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        a.set_ack_mode(AckMode::Invalid);
        assert_eq!(links.send_keep_alive().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_link_reconnects_at_keep_alive() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        let a = transport.camera("GoPro A").unwrap();
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);
        assert_eq!(links.connect().await, 2);

        a.drop_link();
        assert!(!links.is_connected().await);

        assert_eq!(links.send_keep_alive().await, 2);
        assert!(links.is_connected().await);
        assert_eq!(a.connect_attempts(), 2);
        assert_eq!(a.count_writes(&KEEP_ALIVE), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_camera_stays_tracked() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        let a = transport.camera("GoPro A").unwrap();
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);
        assert_eq!(links.connect().await, 2);

        a.drop_link();
        a.set_reachable(false);
        assert_eq!(links.send_keep_alive().await, 1);
        assert_eq!(links.send_keep_alive().await, 1);
        assert_eq!(links.fleet_size(), 2);
        // one initial connect plus two attempts per round
        assert_eq!(a.connect_attempts(), 5);
    }

    #[tokio::test]
    async fn test_start_stop_counts_per_camera() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        let b = transport.camera("GoPro B").unwrap();
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);
        assert_eq!(links.connect().await, 2);

        assert_eq!(links.start_recording().await, 2);
        b.set_fail_writes(true);
        assert_eq!(links.stop_recording().await, 1);

        let a = transport.camera("GoPro A").unwrap();
        assert_eq!(a.count_writes(&START_RECORDING), 1);
        assert_eq!(a.count_writes(&STOP_RECORDING), 1);
        assert_eq!(b.count_writes(&STOP_RECORDING), 0);
    }

    #[tokio::test]
    async fn test_start_with_empty_fleet() {
        let transport = MockTransport::default();
        let mut links = manager(&transport, &["GoPro A"]);
        assert_eq!(links.start_recording().await, 0);
        assert_eq!(links.send_keep_alive().await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_stops_recording_first() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        let mut links = manager(&transport, &["GoPro A", "GoPro B"]);
        assert_eq!(links.connect().await, 2);
        assert_eq!(links.start_recording().await, 2);
        links.set_recording(true);

        assert_eq!(links.disconnect().await, 2);
        assert_eq!(links.fleet_size(), 0);
        assert!(!links.is_recording());
        assert!(!links.is_connected().await);

        for camera in transport.cameras() {
            assert_eq!(camera.count_writes(&STOP_RECORDING), 1);
            assert_eq!(camera.disconnect_calls(), 1);
            assert!(!camera.is_connected_sync());
        }
    }

    #[tokio::test]
    async fn test_disconnect_without_recording_sends_no_stop() {
        let transport = MockTransport::with_names(&["GoPro A"]);
        let mut links = manager(&transport, &["GoPro A"]);
        assert_eq!(links.connect().await, 1);

        assert_eq!(links.disconnect().await, 1);
        let a = transport.camera("GoPro A").unwrap();
        assert_eq!(a.count_writes(&STOP_RECORDING), 0);
        assert!(links.slot(a.address()).is_none());
    }

    #[test]
    fn test_slot_delivery() {
        let mut slot = NotificationSlot::default();
        slot.deliver(vec![1]);
        assert!(!slot.signalled);
        assert_eq!(slot.last_payload, Some(vec![1]));

        slot.arm();
        assert!(slot.awaiting);
        assert_eq!(slot.last_payload, None);
        slot.deliver(vec![0x02, 0x5B, 0x00]);
        assert!(slot.signalled);
        assert!(!slot.awaiting);
    }
}
