//! Shared vocabulary for commands and their outcomes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The fixed command vocabulary understood by the camera worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CommandKind {
    /// Discover and connect the allow-listed cameras.
    Connect,
    /// Close every link and end the worker session.
    Disconnect,
    /// Start recording on every tracked camera.
    StartRecording,
    /// Stop recording on every tracked camera.
    StopRecording,
    /// Run one keep-alive round immediately.
    KeepAlive,
    /// End the worker loop.
    StopWorker,
}

impl CommandKind {
    /// Whether the worker loop ends after executing this command.
    pub fn is_terminal(self) -> bool {
        matches!(self, CommandKind::Disconnect | CommandKind::StopWorker)
    }

    /// Short lowercase name, as used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Connect => "connect",
            CommandKind::Disconnect => "disconnect",
            CommandKind::StartRecording => "record_start",
            CommandKind::StopRecording => "record_stop",
            CommandKind::KeepAlive => "keep_alive",
            CommandKind::StopWorker => "stop",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a fan-out operation went across the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Outcome {
    /// Every camera acknowledged.
    Total,
    /// Some, but not all, cameras acknowledged.
    Partial,
    /// No camera acknowledged (or the fleet is empty).
    Failed,
}

impl Outcome {
    /// Classify a success count against the expected fleet size.
    pub fn classify(success_count: usize, fleet_size: usize) -> Self {
        if success_count == 0 {
            Outcome::Failed
        } else if success_count >= fleet_size {
            Outcome::Total
        } else {
            Outcome::Partial
        }
    }
}
