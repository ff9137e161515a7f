//! Command implementations for the CLI.

mod ping;
mod run;
mod scan;

pub use ping::{PingReport, cmd_ping};
pub use run::{cmd_run, follow_schedule};
pub use scan::cmd_scan;
