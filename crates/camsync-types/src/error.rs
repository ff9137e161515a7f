//! Error types for payload decoding in camsync-types.

use thiserror::Error;

/// Errors that can occur when decoding camera notifications.
///
/// This error type is transport-agnostic and does not include
/// BLE-specific errors (those belong in camsync-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// No payload was received at all.
    #[error("Missing payload")]
    Missing,

    /// Payload shorter than the fixed layout requires.
    #[error("Payload requires {expected} bytes, got {actual}")]
    InsufficientBytes {
        /// Minimum number of bytes for the layout.
        expected: usize,
        /// Number of bytes received.
        actual: usize,
    },

    /// Payload has the right length but unexpected content.
    #[error("Unexpected payload: {0:02X?}")]
    Unexpected(Vec<u8>),
}

/// Result type alias using camsync-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
