//! Blocking facade over the command worker.
//!
//! [`CommandBridge`] lets any thread send a command to the worker and wait,
//! with a timeout, for its result. Every command carries a fresh correlation
//! token; results carrying another token are answers to commands whose
//! callers already gave up, and are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use camsync_types::CommandKind;

use crate::config::AllowList;
use crate::link::LinkOptions;
use crate::messages::{Command, CommandResult, NO_RESPONSE, NOT_RUNNING};
use crate::traits::Transport;
use crate::worker::{self, WorkerHandle, WorkerOptions};

/// Wait budget for a connect.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait budget for a start or stop.
pub const RECORD_TIMEOUT: Duration = Duration::from_secs(3);

/// Wait budget for the stop sent after the grace period.
pub const DELAYED_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait budget for a disconnect or worker shutdown.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait budget for `kind`.
pub fn default_timeout(kind: CommandKind) -> Duration {
    match kind {
        CommandKind::Connect => CONNECT_TIMEOUT,
        CommandKind::StartRecording | CommandKind::StopRecording => RECORD_TIMEOUT,
        CommandKind::KeepAlive => RECORD_TIMEOUT * 2,
        CommandKind::Disconnect | CommandKind::StopWorker => DISCONNECT_TIMEOUT,
    }
}

/// Synchronous entry point to the command worker.
///
/// The bridge can be shared between threads (for example with `Arc`). Calls
/// to [`execute`](Self::execute) are serialized: one caller waits at a time.
pub struct CommandBridge {
    worker: Mutex<Option<WorkerHandle>>,
    next_token: AtomicU64,
    link_options: LinkOptions,
    worker_options: WorkerOptions,
}

impl std::fmt::Debug for CommandBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBridge")
            .field("running", &self.is_running())
            .field("link_options", &self.link_options)
            .field("worker_options", &self.worker_options)
            .finish_non_exhaustive()
    }
}

impl Default for CommandBridge {
    fn default() -> Self {
        Self::new(LinkOptions::default(), WorkerOptions::default())
    }
}

impl CommandBridge {
    /// Create a bridge with no worker running.
    pub fn new(link_options: LinkOptions, worker_options: WorkerOptions) -> Self {
        Self {
            worker: Mutex::new(None),
            next_token: AtomicU64::new(1),
            link_options,
            worker_options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<WorkerHandle>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Launch a worker for `allow_list` unless one is already running.
    ///
    /// Returns `Ok(false)` when a worker was already running.
    pub fn start(&self, transport: Box<dyn Transport>, allow_list: AllowList) -> std::io::Result<bool> {
        let mut guard = self.lock();
        if guard
            .as_ref()
            .is_some_and(|handle| !handle.thread.is_finished())
        {
            debug!("Worker already running");
            return Ok(false);
        }

        info!("Starting worker for {} camera(s)", allow_list.len());
        *guard = Some(worker::spawn(
            transport,
            allow_list,
            self.link_options.clone(),
            self.worker_options.clone(),
        )?);
        Ok(true)
    }

    /// Whether a worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|handle| !handle.thread.is_finished())
    }

    /// Send a command and block up to `timeout` for its result.
    ///
    /// Never fails: a stopped worker or a missed deadline produce a result
    /// with a zero count. Must not be called from the worker thread.
    pub fn execute(
        &self,
        kind: CommandKind,
        payload: Option<&str>,
        timeout: Duration,
    ) -> CommandResult {
        let mut guard = self.lock();
        let Some(handle) = guard
            .as_ref()
            .filter(|handle| !handle.thread.is_finished())
        else {
            debug!(%kind, "Worker not running");
            return CommandResult::failure(kind, NOT_RUNNING);
        };

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut command = Command::new(kind).with_token(token);
        command.payload = payload.map(str::to_string);

        if handle.command_tx.send(command).is_err() {
            warn!(%kind, "Worker command channel closed");
            *guard = None;
            return CommandResult::failure(kind, NOT_RUNNING);
        }

        let deadline = Instant::now() + timeout;
        let result = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match handle.result_rx.recv_timeout(remaining) {
                Ok(result) if result.token == Some(token) => break result,
                Ok(stale) => debug!(token = ?stale.token, kind = %stale.kind, "Discarding stale result"),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(%kind, ?timeout, "No response from worker");
                    let mut result = CommandResult::failure(kind, NO_RESPONSE);
                    result.token = Some(token);
                    return result;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(%kind, "Worker exited without answering");
                    *guard = None;
                    return CommandResult::failure(kind, NOT_RUNNING);
                }
            }
        };

        if kind.is_terminal()
            && let Some(handle) = guard.take()
            && handle.thread.join().is_err()
        {
            warn!("Worker thread panicked");
        }
        result
    }

    /// Send a command with its default timeout.
    pub fn execute_default(&self, kind: CommandKind, payload: Option<&str>) -> CommandResult {
        self.execute(kind, payload, default_timeout(kind))
    }

    /// Shut the worker down, closing any remaining links, and join it.
    pub fn stop(&self) {
        if !self.is_running() {
            self.lock().take();
            return;
        }
        let result = self.execute(CommandKind::StopWorker, None, DISCONNECT_TIMEOUT);
        if result.message == NO_RESPONSE {
            warn!("Worker did not stop in time, detaching");
            self.lock().take();
        }
    }
}

impl Drop for CommandBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use camsync_types::Outcome;

    fn started(transport: &MockTransport, names: &[&str]) -> CommandBridge {
        let bridge = CommandBridge::default();
        assert!(
            bridge
                .start(Box::new(transport.clone()), AllowList::new(names.iter().copied()))
                .unwrap()
        );
        bridge
    }

    #[test]
    fn test_not_running_fails_immediately() {
        let bridge = CommandBridge::default();
        let start = Instant::now();
        let result = bridge.execute(CommandKind::Connect, None, Duration::from_secs(1));

        assert_eq!(result.kind, CommandKind::Connect);
        assert_eq!(result.success_count, 0);
        assert_eq!(result.message, "Thread not running");
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_connect_and_record() {
        let transport = MockTransport::with_names(&["GoPro A", "GoPro B"]);
        let bridge = started(&transport, &["GoPro A", "GoPro B"]);
        assert!(bridge.is_running());

        let result = bridge.execute_default(CommandKind::Connect, None);
        assert_eq!(result.outcome(), Outcome::Total);

        let result = bridge.execute(
            CommandKind::StartRecording,
            Some("Task A (recording)"),
            RECORD_TIMEOUT,
        );
        assert_eq!(result.success_count, 2);
    }

    #[test]
    fn test_start_twice_keeps_first_worker() {
        let transport = MockTransport::with_names(&["GoPro A"]);
        let bridge = started(&transport, &["GoPro A"]);
        assert!(
            !bridge
                .start(Box::new(transport.clone()), AllowList::new(["GoPro A"]))
                .unwrap()
        );
    }

    #[test]
    fn test_timeout_then_stale_result_discarded() {
        let transport = MockTransport::with_names(&["GoPro A"]);
        let camera = transport.camera("GoPro A").unwrap();
        let bridge = started(&transport, &["GoPro A"]);
        assert_eq!(bridge.execute_default(CommandKind::Connect, None).success_count, 1);

        camera.set_write_latency(Duration::from_millis(400));
        let late = bridge.execute(CommandKind::StartRecording, None, Duration::from_millis(50));
        assert_eq!(late.message, "No response");
        assert_eq!(late.success_count, 0);

        camera.set_write_latency(Duration::ZERO);
        let result = bridge.execute(CommandKind::StopRecording, None, Duration::from_secs(5));
        assert_eq!(result.kind, CommandKind::StopRecording);
        assert_eq!(result.success_count, 1);
    }

    #[test]
    fn test_disconnect_ends_worker() {
        let transport = MockTransport::with_names(&["GoPro A"]);
        let bridge = started(&transport, &["GoPro A"]);
        bridge.execute_default(CommandKind::Connect, None);

        let result = bridge.execute_default(CommandKind::Disconnect, None);
        assert_eq!(result.success_count, 1);
        assert!(!bridge.is_running());

        let result = bridge.execute_default(CommandKind::StartRecording, None);
        assert_eq!(result.message, NOT_RUNNING);

        // a fresh worker can be started afterwards
        assert!(
            bridge
                .start(Box::new(transport.clone()), AllowList::new(["GoPro A"]))
                .unwrap()
        );
    }

    #[test]
    fn test_stop_closes_links() {
        let transport = MockTransport::with_names(&["GoPro A"]);
        let bridge = started(&transport, &["GoPro A"]);
        bridge.execute_default(CommandKind::Connect, None);

        bridge.stop();
        assert!(!bridge.is_running());
        assert_eq!(transport.camera("GoPro A").unwrap().disconnect_calls(), 1);
    }

    #[test]
    fn test_drop_stops_worker() {
        let transport = MockTransport::with_names(&["GoPro A"]);
        {
            let bridge = started(&transport, &["GoPro A"]);
            bridge.execute_default(CommandKind::Connect, None);
        }
        assert!(!transport.camera("GoPro A").unwrap().is_connected_sync());
    }

    #[test]
    fn test_default_timeouts() {
        assert_eq!(default_timeout(CommandKind::Connect), Duration::from_secs(30));
        assert_eq!(default_timeout(CommandKind::StartRecording), Duration::from_secs(3));
        assert_eq!(default_timeout(CommandKind::Disconnect), Duration::from_secs(10));
    }
}
