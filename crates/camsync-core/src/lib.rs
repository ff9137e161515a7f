//! Synchronized recording triggers for a fleet of BLE cameras.
//!
//! This crate drives one or more GoPro-compatible cameras over Bluetooth Low
//! Energy from a schedule that runs on ordinary threads. All Bluetooth I/O
//! happens on a dedicated worker thread; callers talk to it through a
//! blocking, time-bounded bridge.
//!
//! # Features
//!
//! - **Discovery by name**: cameras are matched against a configured allow-list
//! - **Fleet fan-out**: start, stop and keep-alive report how many cameras
//!   answered instead of failing as a whole
//! - **Keep-alive**: periodic heartbeats with acknowledgment checking
//! - **Lazy reconnection**: dropped cameras are reconnected at keep-alive time
//! - **Keyword triggers**: stage titles are turned into start/stop commands,
//!   with a grace period before each stop
//! - **Mock transport**: the whole stack can run without hardware
//!
//! # Layers
//!
//! | Layer | Type | Runs on |
//! |-------|------|---------|
//! | Trigger | [`Trigger`] | caller thread |
//! | Bridge | [`CommandBridge`] | caller thread (blocks) |
//! | Worker | [`worker::CommandWorker`] | worker thread |
//! | Fleet | [`LinkManager`] | worker thread |
//! | Camera | [`CameraLink`] ([`BleCamera`], [`MockCamera`]) | worker thread |
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use camsync_core::{BleTransport, Trigger};
//!
//! let mut trigger = Trigger::new(Arc::new(BleTransport::default()));
//! trigger.set_device_names(["GoPro 1234", "GoPro 5678"]);
//!
//! trigger.connect();
//! println!("{}", trigger.status());
//!
//! trigger.trigger_in("Task A (recording)");
//! trigger.trigger_out("Break");
//! trigger.close();
//! ```

pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod link;
pub mod messages;
pub mod mock;
pub mod reconnect;
pub mod scan;
pub mod traits;
pub mod trigger;
pub mod util;
pub mod worker;

pub use bridge::CommandBridge;
pub use config::{AllowList, SessionConfig, load_device_names};
pub use device::{BleCamera, ConnectionConfig};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use link::{LinkManager, LinkOptions, NotificationSlot};
pub use messages::{Command, CommandResult};
pub use mock::{AckMode, MockCamera, MockTransport};
pub use reconnect::ReconnectOptions;
pub use scan::{BleTransport, DiscoveredDevice, ScanOptions, scan_with_options};
pub use traits::{CameraLink, NotificationStream, Transport};
pub use trigger::{LinkStatus, StatusHandle, Trigger, TriggerOptions, TriggerState};
pub use worker::{KeepAliveTimer, WorkerOptions};

// Re-export the shared vocabulary
pub use camsync_types::protocol;
pub use camsync_types::{CommandKind, Outcome, ParseError};
