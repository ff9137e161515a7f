//! Fixed-format opcodes and the keep-alive acknowledgment layout.
//!
//! Cameras understand exactly three outbound verbs. Each verb is a 4-byte
//! opcode written with response to one characteristic:
//!
//! | Verb | Characteristic | Bytes |
//! |------|----------------|-------|
//! | Start recording | [`COMMAND`] | `03 01 01 01` |
//! | Stop recording | [`COMMAND`] | `03 01 01 00` |
//! | Keep-alive | [`SETTING`] | `03 5B 01 42` |
//!
//! The only inbound message interpreted is the keep-alive acknowledgment on
//! [`RESPONSE`](crate::uuid::RESPONSE): `02 5B 00`, where `0x02` is the
//! payload length, `0x5B` the keep-alive setting id and `0x00` the ok status.

use uuid::Uuid;

use crate::error::{ParseError, ParseResult};
use crate::uuid::{COMMAND, SETTING};

/// Setting id of the keep-alive setting.
pub const KEEP_ALIVE_ID: u8 = 0x5B;

/// Status byte reported by the camera for an accepted setting write.
pub const STATUS_OK: u8 = 0x00;

/// Shutter on opcode.
pub const START_RECORDING: [u8; 4] = [0x03, 0x01, 0x01, 0x01];

/// Shutter off opcode.
pub const STOP_RECORDING: [u8; 4] = [0x03, 0x01, 0x01, 0x00];

/// Keep-alive opcode (setting 0x5B, value 0x42).
pub const KEEP_ALIVE: [u8; 4] = [0x03, KEEP_ALIVE_ID, 0x01, 0x42];

/// Expected prefix of a keep-alive acknowledgment.
pub const KEEP_ALIVE_ACK: [u8; 3] = [0x02, KEEP_ALIVE_ID, STATUS_OK];

/// An outbound verb understood by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Start recording video.
    StartRecording,
    /// Stop recording video.
    StopRecording,
    /// Heartbeat required by the firmware to keep the BLE session open.
    KeepAlive,
}

impl Verb {
    /// The characteristic this verb is written to.
    pub fn characteristic(self) -> Uuid {
        match self {
            Verb::StartRecording | Verb::StopRecording => COMMAND,
            Verb::KeepAlive => SETTING,
        }
    }

    /// The opcode bytes for this verb.
    pub fn opcode(self) -> &'static [u8; 4] {
        match self {
            Verb::StartRecording => &START_RECORDING,
            Verb::StopRecording => &STOP_RECORDING,
            Verb::KeepAlive => &KEEP_ALIVE,
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verb::StartRecording => write!(f, "start recording"),
            Verb::StopRecording => write!(f, "stop recording"),
            Verb::KeepAlive => write!(f, "keep-alive"),
        }
    }
}

/// Decode a keep-alive acknowledgment.
///
/// Bytes past the third are ignored. Anything else (wrong id, non-ok status,
/// truncated or absent payload) is an error.
pub fn parse_keep_alive_ack(payload: Option<&[u8]>) -> ParseResult<()> {
    let data = payload.ok_or(ParseError::Missing)?;
    if data.len() < KEEP_ALIVE_ACK.len() {
        return Err(ParseError::InsufficientBytes {
            expected: KEEP_ALIVE_ACK.len(),
            actual: data.len(),
        });
    }
    if data[..KEEP_ALIVE_ACK.len()] != KEEP_ALIVE_ACK {
        return Err(ParseError::Unexpected(data.to_vec()));
    }
    Ok(())
}

/// Check whether a payload is a valid keep-alive acknowledgment.
pub fn is_keep_alive_ack(payload: Option<&[u8]>) -> bool {
    parse_keep_alive_ack(payload).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::RESPONSE;
    use proptest::prelude::*;

    #[test]
    fn test_opcodes() {
        assert_eq!(START_RECORDING, [0x03, 0x01, 0x01, 0x01]);
        assert_eq!(STOP_RECORDING, [0x03, 0x01, 0x01, 0x00]);
        assert_eq!(KEEP_ALIVE, [0x03, 0x5B, 0x01, 0x42]);
    }

    #[test]
    fn test_verb_routing() {
        assert_eq!(Verb::StartRecording.characteristic(), COMMAND);
        assert_eq!(Verb::StopRecording.characteristic(), COMMAND);
        assert_eq!(Verb::KeepAlive.characteristic(), SETTING);
        assert_ne!(Verb::KeepAlive.characteristic(), RESPONSE);
        assert_eq!(Verb::KeepAlive.opcode(), &KEEP_ALIVE);
    }

    #[test]
    fn test_valid_ack() {
        assert!(is_keep_alive_ack(Some(&[0x02, 0x5B, 0x00])));
        // trailing bytes are not interpreted
        assert!(is_keep_alive_ack(Some(&[0x02, 0x5B, 0x00, 0xFF])));
    }

    #[test]
    fn test_error_status_ack() {
        assert_eq!(
            parse_keep_alive_ack(Some(&[0x02, 0x5B, 0x01])),
            Err(ParseError::Unexpected(vec![0x02, 0x5B, 0x01]))
        );
    }

    #[test]
    fn test_truncated_ack() {
        assert_eq!(
            parse_keep_alive_ack(Some(&[0x02, 0x5B])),
            Err(ParseError::InsufficientBytes {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_absent_and_empty_ack() {
        assert_eq!(parse_keep_alive_ack(None), Err(ParseError::Missing));
        assert!(!is_keep_alive_ack(Some(&[])));
    }

    proptest! {
        #[test]
        fn prop_only_ack_prefix_is_valid(data in proptest::collection::vec(any::<u8>(), 0..8)) {
            let expected = data.len() >= 3 && data[..3] == KEEP_ALIVE_ACK;
            prop_assert_eq!(is_keep_alive_ack(Some(data.as_slice())), expected);
        }
    }
}
