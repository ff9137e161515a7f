//! Command-line recording trigger for fleets of BLE cameras.
//!
//! The `camsync` binary is a thin front end over [`camsync_core::Trigger`]:
//! it reads stage titles and turns keyword transitions into start and stop
//! commands for every configured camera.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | List nearby BLE devices, marking configured cameras |
//! | `ping` | Connect, run one keep-alive round, disconnect |
//! | `run` | Connect, then follow stage titles read from stdin |
//!
//! # Configuration
//!
//! Settings are read from `config.toml` in the platform config directory
//! (for example `~/.config/camsync/config.toml` on Linux). Command-line flags
//! override file values:
//!
//! ```toml
//! [session]
//! device_names = ["GoPro 1234", "GoPro 5678"]
//! keyword = "(recording)"
//! stop_delay_secs = 5
//! ```

pub mod cli;
pub mod commands;
pub mod config;
