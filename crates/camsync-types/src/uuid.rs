//! Bluetooth UUIDs for GoPro-compatible cameras.
//!
//! Only the three characteristics used for recording control are listed.
//! Everything else exposed by the camera firmware is ignored.

use uuid::{Uuid, uuid};

// --- Control Characteristic UUIDs ---

/// Command characteristic. Shutter start/stop opcodes are written here.
pub const COMMAND: Uuid = uuid!("b5f90072-aa8d-11e3-9046-0002a5d5c51b");

/// Setting characteristic. The keep-alive opcode is written here.
pub const SETTING: Uuid = uuid!("b5f90074-aa8d-11e3-9046-0002a5d5c51b");

/// Setting response characteristic (notify).
///
/// The camera acknowledges keep-alive writes with a notification on this
/// characteristic.
pub const RESPONSE: Uuid = uuid!("b5f90075-aa8d-11e3-9046-0002a5d5c51b");
