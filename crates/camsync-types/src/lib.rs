//! Wire protocol and shared types for BLE camera recording triggers.
//!
//! This crate holds everything about the camera protocol that does not need
//! a Bluetooth stack: characteristic UUIDs, the three opcodes, the keep-alive
//! acknowledgment decoder, and the command vocabulary shared by the worker
//! and its callers.
//!
//! # Example
//!
//! ```
//! use camsync_types::protocol::{Verb, is_keep_alive_ack};
//!
//! assert_eq!(Verb::KeepAlive.opcode(), &[0x03, 0x5B, 0x01, 0x42]);
//! assert!(is_keep_alive_ack(Some(&[0x02, 0x5B, 0x00])));
//! assert!(!is_keep_alive_ack(Some(&[0x02, 0x5B, 0x01])));
//! ```

pub mod error;
pub mod protocol;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use protocol::{Verb, is_keep_alive_ack, parse_keep_alive_ack};
pub use types::{CommandKind, Outcome};
pub use uuid as uuids;
