//! Keyword-driven recording triggers.
//!
//! A schedule front end calls [`Trigger::trigger_in`] and
//! [`Trigger::trigger_out`] with the title of the current stage, over and
//! over. The trigger watches for the keyword appearing and disappearing and
//! turns those transitions into start and stop commands. Stops are sent
//! after a grace period from a detached thread, so the caller never waits
//! for them.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use camsync_types::CommandKind;

use crate::bridge::{
    CONNECT_TIMEOUT, CommandBridge, DELAYED_STOP_TIMEOUT, DISCONNECT_TIMEOUT, RECORD_TIMEOUT,
};
use crate::config::{AllowList, DEFAULT_KEYWORD, SessionConfig};
use crate::messages::CommandResult;
use crate::traits::Transport;

/// Options for the trigger state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOptions {
    /// Substring of a stage title that means "record this stage".
    pub keyword: String,
    /// Grace period between leaving a recorded stage and sending the stop.
    pub stop_delay: Duration,
    /// Wait budget for connect.
    pub connect_timeout: Duration,
    /// Wait budget for an immediate start.
    pub record_timeout: Duration,
    /// Wait budget for the delayed stop.
    pub delayed_stop_timeout: Duration,
    /// Wait budget for disconnect.
    pub disconnect_timeout: Duration,
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.to_string(),
            stop_delay: Duration::from_secs(5),
            connect_timeout: CONNECT_TIMEOUT,
            record_timeout: RECORD_TIMEOUT,
            delayed_stop_timeout: DELAYED_STOP_TIMEOUT,
            disconnect_timeout: DISCONNECT_TIMEOUT,
        }
    }
}

/// Whether the trigger considers the cameras recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerState {
    /// Not inside a recorded stage.
    #[default]
    Idle,
    /// Inside a recorded stage.
    Recording,
}

/// Status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    /// No session.
    #[default]
    Disconnected,
    /// A connect is in progress.
    Connecting,
    /// No camera could be connected.
    ConnectFailed,
    /// Every allow-listed camera answered.
    Connected,
    /// Recording was started.
    Recording,
    /// No camera accepted the start.
    FailedToStart,
    /// No camera accepted the stop.
    FailedToStop,
    /// Some, but not all, cameras answered the connect.
    Partial {
        /// Cameras that answered.
        ok: usize,
        /// Cameras in the allow-list.
        total: usize,
    },
}

impl LinkStatus {
    /// Status for a connect result.
    pub fn from_connect(result: &CommandResult) -> Self {
        if result.success_count == 0 {
            LinkStatus::ConnectFailed
        } else if result.success_count >= result.fleet_size {
            LinkStatus::Connected
        } else {
            LinkStatus::Partial {
                ok: result.success_count,
                total: result.fleet_size,
            }
        }
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Disconnected => write!(f, "Disconnected"),
            LinkStatus::Connecting => write!(f, "Connecting..."),
            LinkStatus::ConnectFailed => write!(f, "Connect Failed"),
            LinkStatus::Connected => write!(f, "Connected"),
            LinkStatus::Recording => write!(f, "Recording"),
            LinkStatus::FailedToStart => write!(f, "Failed to start"),
            LinkStatus::FailedToStop => write!(f, "Failed to stop"),
            LinkStatus::Partial { ok, total } => write!(f, "Failed ({}/{})", ok, total),
        }
    }
}

/// Message of the result returned by a delayed stop that was not sent.
pub const SUPERSEDED: &str = "Superseded";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Status shared with delayed-stop threads.
#[derive(Debug, Default)]
struct SharedStatus {
    status: Mutex<LinkStatus>,
    /// Bumped by every successful start and by close. A delayed stop only
    /// runs if the generation it was scheduled in is still current. Held
    /// across the bridge call so a start and a stop never interleave.
    generation: Mutex<u64>,
}

impl SharedStatus {
    fn get(&self) -> LinkStatus {
        *lock(&self.status)
    }

    fn set(&self, status: LinkStatus) {
        *lock(&self.status) = status;
    }
}

/// Read-only view of a trigger's status, usable from other threads.
///
/// A front end keeps one of these to show "Connecting..." while
/// [`Trigger::connect`] blocks on another thread.
#[derive(Debug, Clone)]
pub struct StatusHandle(Arc<SharedStatus>);

impl StatusHandle {
    /// Current status.
    pub fn link_status(&self) -> LinkStatus {
        self.0.get()
    }

    /// Current status as display text.
    pub fn status(&self) -> String {
        self.0.get().to_string()
    }
}

/// Turns stage titles into recording commands.
pub struct Trigger {
    transport: Arc<dyn Transport>,
    bridge: Arc<CommandBridge>,
    allow_list: AllowList,
    options: TriggerOptions,
    state: TriggerState,
    shared: Arc<SharedStatus>,
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("allow_list", &self.allow_list)
            .field("options", &self.options)
            .field("state", &self.state)
            .field("status", &self.shared.get())
            .finish_non_exhaustive()
    }
}

impl Trigger {
    /// Create a trigger with default bridge and trigger options.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_options(transport, CommandBridge::default(), TriggerOptions::default())
    }

    /// Create a trigger from explicit parts.
    pub fn with_options(
        transport: Arc<dyn Transport>,
        bridge: CommandBridge,
        options: TriggerOptions,
    ) -> Self {
        Self {
            transport,
            bridge: Arc::new(bridge),
            allow_list: AllowList::default(),
            options,
            state: TriggerState::Idle,
            shared: Arc::new(SharedStatus::default()),
        }
    }

    /// Create a trigger for a whole session configuration.
    pub fn from_config(config: &SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let bridge = CommandBridge::new(config.link_options(), config.worker_options());
        let mut trigger = Self::with_options(transport, bridge, config.trigger_options());
        trigger.allow_list = config.allow_list();
        trigger
    }

    /// Replace the camera names used by the next connect.
    pub fn set_device_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allow_list = AllowList::new(names);
    }

    /// Change the keyword that marks recorded stages.
    pub fn set_keyword(&mut self, keyword: impl Into<String>) {
        self.options.keyword = keyword.into();
    }

    /// Change the grace period before stops.
    pub fn set_stop_delay(&mut self, delay: Duration) {
        self.options.stop_delay = delay;
    }

    /// The configured camera names.
    pub fn device_names(&self) -> &[String] {
        self.allow_list.names()
    }

    /// Current trigger state.
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Whether the trigger is inside a recorded stage.
    pub fn is_recording(&self) -> bool {
        self.state == TriggerState::Recording
    }

    /// Current status.
    pub fn link_status(&self) -> LinkStatus {
        self.shared.get()
    }

    /// Current status as display text.
    pub fn status(&self) -> String {
        self.shared.get().to_string()
    }

    /// A handle that reads the status from any thread.
    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle(Arc::clone(&self.shared))
    }

    /// Start the worker and connect the configured cameras.
    ///
    /// Blocks for up to the connect timeout.
    pub fn connect(&mut self) -> CommandResult {
        if self.allow_list.is_empty() {
            warn!("No camera names configured");
            self.shared.set(LinkStatus::ConnectFailed);
            return CommandResult::failure(CommandKind::Connect, "No devices configured");
        }

        self.shared.set(LinkStatus::Connecting);
        let transport: Box<dyn Transport> = Box::new(Arc::clone(&self.transport));
        if let Err(e) = self.bridge.start(transport, self.allow_list.clone()) {
            warn!("Failed to start worker: {}", e);
            self.shared.set(LinkStatus::ConnectFailed);
            return CommandResult::failure(CommandKind::Connect, e.to_string());
        }

        let result = self
            .bridge
            .execute(CommandKind::Connect, None, self.options.connect_timeout);
        let status = LinkStatus::from_connect(&result);
        info!("Connect: {}", status);
        self.shared.set(status);
        result
    }

    /// Start recording when `title` enters a recorded stage.
    ///
    /// Returns the start result, or `None` when no transition happened.
    pub fn trigger_in(&mut self, title: &str) -> Option<CommandResult> {
        if self.state != TriggerState::Idle || !title.contains(&self.options.keyword) {
            return None;
        }

        let mut generation = lock(&self.shared.generation);
        let result = self.bridge.execute(
            CommandKind::StartRecording,
            Some(title),
            self.options.record_timeout,
        );
        if result.is_success() {
            info!("Recording started for '{}'", title);
            *generation += 1;
            self.state = TriggerState::Recording;
            self.shared.set(LinkStatus::Recording);
        } else {
            warn!("Failed to start recording for '{}': {}", title, result.message);
            self.shared.set(LinkStatus::FailedToStart);
        }
        Some(result)
    }

    /// Schedule a stop when `title` leaves a recorded stage.
    ///
    /// The state flips to idle at once; the stop itself is sent after the
    /// grace period from a detached thread, whose handle is returned. A
    /// successful start or a close during the grace period cancels it, and
    /// the thread returns a zero-count result with [`SUPERSEDED`].
    pub fn trigger_out(&mut self, title: &str) -> Option<thread::JoinHandle<CommandResult>> {
        if self.state != TriggerState::Recording || title.contains(&self.options.keyword) {
            return None;
        }
        self.state = TriggerState::Idle;

        let bridge = Arc::clone(&self.bridge);
        let shared = Arc::clone(&self.shared);
        let delay = self.options.stop_delay;
        let timeout = self.options.delayed_stop_timeout;
        let scheduled = *lock(&shared.generation);
        let title = title.to_string();
        info!("Stopping recording in {:?}", delay);

        let spawned = thread::Builder::new()
            .name("camsync-delayed-stop".to_string())
            .spawn(move || {
                thread::sleep(delay);
                let generation = lock(&shared.generation);
                if *generation != scheduled {
                    info!("Recording resumed or session closed, stop for '{}' not sent", title);
                    return CommandResult::failure(CommandKind::StopRecording, SUPERSEDED);
                }
                let result = bridge.execute(CommandKind::StopRecording, Some(&title), timeout);
                if result.is_success() {
                    shared.set(LinkStatus::Connected);
                } else {
                    warn!("Failed to stop recording: {}", result.message);
                    shared.set(LinkStatus::FailedToStop);
                }
                drop(generation);
                result
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to schedule stop: {}", e);
                self.shared.set(LinkStatus::FailedToStop);
                None
            }
        }
    }

    /// End the session if the schedule finished inside a recorded stage.
    pub fn trigger_end(&mut self) -> Option<CommandResult> {
        if self.state != TriggerState::Recording {
            return None;
        }
        Some(self.close())
    }

    /// Disconnect every camera and stop the worker.
    pub fn close(&mut self) -> CommandResult {
        self.state = TriggerState::Idle;
        let mut generation = lock(&self.shared.generation);
        *generation += 1;
        let result = self.bridge.execute(
            CommandKind::Disconnect,
            None,
            self.options.disconnect_timeout,
        );
        self.shared.set(LinkStatus::Disconnected);
        result
    }
}
