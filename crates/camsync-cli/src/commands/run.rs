//! Run command implementation.
//!
//! Each input line is the title of the current schedule stage. Titles are
//! fed to the trigger as they arrive, so a front end can pipe its schedule
//! into `camsync run` and the cameras follow along.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use camsync_core::{SessionConfig, Trigger};
use tracing::info;

/// Feed stage titles from `input` to `trigger`, writing the status after
/// each one to `out`.
///
/// At end of input, pending delayed stops are awaited and the session is
/// closed. Returns the number of titles processed.
pub fn follow_schedule<R: BufRead, W: Write>(
    trigger: &mut Trigger,
    input: R,
    out: &mut W,
) -> Result<usize> {
    let mut pending = Vec::new();
    let mut stages = 0;

    for line in input.lines() {
        let line = line?;
        let title = line.trim();
        if title.is_empty() {
            continue;
        }
        stages += 1;

        trigger.trigger_in(title);
        if let Some(stop) = trigger.trigger_out(title) {
            pending.push(stop);
        }
        writeln!(out, "{}\t{}", title, trigger.status())?;
        out.flush()?;
    }

    info!("Schedule finished after {} stage(s)", stages);
    for stop in pending {
        stop.join()
            .map_err(|_| anyhow!("Delayed stop thread panicked"))?;
    }
    if trigger.trigger_end().is_none() {
        trigger.close();
    }
    writeln!(out, "{}", trigger.status())?;
    Ok(stages)
}

pub fn cmd_run(session: &SessionConfig) -> Result<()> {
    if session.device_names.is_empty() {
        bail!("No cameras configured. Pass --device or set device_names in the config file");
    }

    let mut trigger = Trigger::from_config(session, Arc::new(session.ble_transport()));
    let result = trigger.connect();
    eprintln!("{}", trigger.status());
    if result.success_count == 0 {
        bail!("Could not connect to any camera");
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    follow_schedule(&mut trigger, stdin.lock(), &mut stdout.lock())?;
    Ok(())
}
