//! Messages exchanged between callers and the command worker.
//!
//! A [`Command`] travels from a caller thread to the worker on the inbound
//! channel; a [`CommandResult`] travels back on the outbound channel. Both
//! are plain data so they can cross threads freely.

use camsync_types::{CommandKind, Outcome};
use serde::{Deserialize, Serialize};

/// Message shown when a result is synthesized because the worker is down.
pub const NOT_RUNNING: &str = "Thread not running";

/// Message shown when no result arrived before the caller's timeout.
pub const NO_RESPONSE: &str = "No response";

/// A command for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// What to do.
    pub kind: CommandKind,
    /// Opaque context, logged alongside the command (usually a stage title).
    pub payload: Option<String>,
    /// Echoed back in the matching result.
    pub token: Option<u64>,
}

impl Command {
    /// A command with no payload and no correlation token.
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            payload: None,
            token: None,
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Attach a correlation token.
    #[must_use]
    pub fn with_token(mut self, token: u64) -> Self {
        self.token = Some(token);
        self
    }
}

/// The answer to one [`Command`].
///
/// `success_count` is a count, not a flag: compare it with `fleet_size`, or
/// use [`outcome`](Self::outcome).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Kind of the command this answers.
    pub kind: CommandKind,
    /// Token of the command this answers.
    pub token: Option<u64>,
    /// Cameras that completed the operation.
    pub success_count: usize,
    /// Cameras the count is measured against.
    pub fleet_size: usize,
    /// Human-readable summary.
    pub message: String,
}

impl CommandResult {
    /// A result for a command that ran.
    pub fn new(command: &Command, success_count: usize, fleet_size: usize) -> Self {
        Self {
            kind: command.kind,
            token: command.token,
            success_count,
            fleet_size,
            message: format!("{}/{} ok", success_count, fleet_size),
        }
    }

    /// A zero-count result that never reached a camera.
    pub fn failure(kind: CommandKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            token: None,
            success_count: 0,
            fleet_size: 0,
            message: message.into(),
        }
    }

    /// Classify the count against the fleet size.
    pub fn outcome(&self) -> Outcome {
        Outcome::classify(self.success_count, self.fleet_size)
    }

    /// Whether at least one camera completed the operation.
    pub fn is_success(&self) -> bool {
        self.success_count > 0
    }
}

impl std::fmt::Display for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
