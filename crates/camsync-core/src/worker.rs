//! Background worker that owns every BLE operation.
//!
//! The [`CommandWorker`] runs on its own OS thread with a private
//! current-thread Tokio runtime, so the Bluetooth stack is only ever driven
//! from one place. It talks to callers through two channels:
//!
//! - Receives [`Command`]s on a Tokio unbounded channel, drained with
//!   `try_recv` so the loop never blocks on it
//! - Sends [`CommandResult`]s on a std channel that callers block on
//!
//! # Architecture
//!
//! Each loop iteration either executes one queued command or, when the queue
//! is empty, runs a keep-alive round if the [`KeepAliveTimer`] is due and
//! otherwise sleeps for the poll interval. Commands run strictly in the order
//! they were sent, and a keep-alive round is never interrupted by a command.

use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info};

use camsync_types::CommandKind;

use crate::config::AllowList;
use crate::link::{LinkManager, LinkOptions};
use crate::messages::{Command, CommandResult};
use crate::traits::Transport;

/// Options for the command worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Time between keep-alive rounds while the fleet is healthy.
    pub keep_alive_interval: Duration,
    /// Idle sleep between two looks at the command queue.
    pub poll_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            keep_alive_interval: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Keep-alive schedule.
///
/// Only a round in which every tracked camera answered moves the timer
/// forward. After a degraded round the timer stays expired, so the next idle
/// tick retries right away.
#[derive(Debug, Clone)]
pub struct KeepAliveTimer {
    interval: Duration,
    last_success: Option<Instant>,
    armed: bool,
}

impl KeepAliveTimer {
    /// A disarmed timer.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_success: None,
            armed: false,
        }
    }

    /// Whether a keep-alive round should run at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.armed
            && self
                .last_success
                .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Whether rounds are scheduled at all.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Instant of the last full-fleet success.
    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    /// Start scheduling rounds.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Stop scheduling rounds and forget the last success.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.last_success = None;
    }

    /// Record the outcome of a round that finished at `now`.
    pub fn record(&mut self, success_count: usize, fleet_size: usize, now: Instant) {
        if fleet_size > 0 && success_count >= fleet_size {
            self.last_success = Some(now);
        }
    }
}

/// Executes commands against one [`LinkManager`].
pub struct CommandWorker {
    links: LinkManager,
    command_rx: mpsc::UnboundedReceiver<Command>,
    result_tx: std_mpsc::Sender<CommandResult>,
    timer: KeepAliveTimer,
    options: WorkerOptions,
}

impl CommandWorker {
    /// Create a worker. Nothing runs until [`run`](Self::run) is awaited.
    pub fn new(
        links: LinkManager,
        command_rx: mpsc::UnboundedReceiver<Command>,
        result_tx: std_mpsc::Sender<CommandResult>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            links,
            command_rx,
            result_tx,
            timer: KeepAliveTimer::new(options.keep_alive_interval),
            options,
        }
    }

    /// The keep-alive schedule.
    pub fn timer(&self) -> &KeepAliveTimer {
        &self.timer
    }

    /// The managed fleet.
    pub fn links(&self) -> &LinkManager {
        &self.links
    }

    /// Run until a terminal command is executed or every sender is gone.
    pub async fn run(mut self) {
        info!("CommandWorker started");

        loop {
            match self.command_rx.try_recv() {
                Ok(command) => {
                    let terminal = command.kind.is_terminal();
                    let result = self.execute(&command).await;
                    if self.result_tx.send(result).is_err() {
                        debug!("Result receiver dropped");
                    }
                    if terminal {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => {
                    if self.timer.is_due(Instant::now()) {
                        self.keep_alive().await;
                    } else {
                        sleep(self.options.poll_interval).await;
                    }
                }
                Err(TryRecvError::Disconnected) => {
                    info!("Command channel closed, shutting down worker");
                    if self.links.fleet_size() > 0 {
                        self.links.disconnect().await;
                    }
                    break;
                }
            }
        }

        info!("CommandWorker stopped");
    }

    /// Execute one command and build its result.
    pub async fn execute(&mut self, command: &Command) -> CommandResult {
        info!(
            kind = %command.kind,
            payload = command.payload.as_deref().unwrap_or(""),
            "Executing command"
        );

        let (count, fleet) = match command.kind {
            CommandKind::Connect => {
                let count = self.links.connect().await;
                let fleet = self.links.fleet_size();
                if fleet > 0 {
                    self.timer.arm();
                }
                self.timer.record(count, fleet, Instant::now());
                (count, self.links.allow_list().len())
            }
            CommandKind::StartRecording => {
                let count = self.links.start_recording().await;
                if count > 0 {
                    self.links.set_recording(true);
                }
                (count, self.links.fleet_size())
            }
            CommandKind::StopRecording => {
                let count = self.links.stop_recording().await;
                if count > 0 {
                    self.links.set_recording(false);
                }
                (count, self.links.fleet_size())
            }
            CommandKind::KeepAlive => {
                let count = self.keep_alive().await;
                (count, self.links.fleet_size())
            }
            CommandKind::Disconnect | CommandKind::StopWorker => {
                let fleet = self.links.fleet_size();
                let count = if fleet > 0 || self.links.is_recording() {
                    self.links.disconnect().await
                } else {
                    0
                };
                self.timer.disarm();
                (count, fleet)
            }
        };

        let result = CommandResult::new(command, count, fleet);
        info!("{}", result);
        result
    }

    async fn keep_alive(&mut self) -> usize {
        let count = self.links.send_keep_alive().await;
        self.timer
            .record(count, self.links.fleet_size(), Instant::now());
        count
    }
}

/// Caller-side ends of a running worker's channels.
#[derive(Debug)]
pub struct WorkerHandle {
    /// Sends commands to the worker.
    pub command_tx: mpsc::UnboundedSender<Command>,
    /// Receives results from the worker.
    pub result_rx: std_mpsc::Receiver<CommandResult>,
    /// The worker thread.
    pub thread: thread::JoinHandle<()>,
}

/// Start a worker on a new thread.
///
/// The thread builds its own current-thread runtime. If that fails the thread
/// exits at once and every later `recv` on the result channel reports a
/// disconnect.
pub fn spawn(
    transport: Box<dyn Transport>,
    allow_list: AllowList,
    link_options: LinkOptions,
    options: WorkerOptions,
) -> std::io::Result<WorkerHandle> {
    let (command_tx, command_rx) = mpsc::unbounded_channel::<Command>();
    let (result_tx, result_rx) = std_mpsc::channel::<CommandResult>();

    let links = LinkManager::new(transport, allow_list, link_options);
    let worker = CommandWorker::new(links, command_rx, result_tx, options);

    let thread = thread::Builder::new()
        .name("camsync-worker".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to create worker runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(worker.run());
        })?;

    Ok(WorkerHandle {
        command_tx,
        result_rx,
        thread,
    })
}
