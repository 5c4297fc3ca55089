//! Foreground loop: sleeps until the next timer deadline, dispatches due
//! timers, and exits on Ctrl-C.
//!
//! Other `timetrack` invocations write the same state file. When the file
//! changes underneath the loop, the tracker is reopened from disk so those
//! edits are picked up instead of being overwritten.

use std::time::Duration;
use tracing::{info, warn};

use super::{open_tracker, CmdResult};

/// Longest sleep between checks for external changes to the state file.
const RELOAD_POLL: Duration = Duration::from_secs(2);

pub fn run() -> CmdResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_loop())
}

async fn run_loop() -> CmdResult {
    let mut tracker = open_tracker()?;
    info!(path = %tracker.store().path().display(), "tracker running");

    loop {
        let wait = match tracker.next_deadline() {
            Some(deadline) => (deadline - tracker.now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(RELOAD_POLL),
            None => RELOAD_POLL,
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, saving state");
                break;
            }
        }

        if tracker.store().changed_on_disk() {
            info!("state file changed on disk, reloading");
            tracker = open_tracker()?;
        }

        for event in tracker.run_due() {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("failed to print event: {e}"),
            }
        }
    }

    if tracker.store().changed_on_disk() {
        tracker = open_tracker()?;
    }
    tracker.persist();
    Ok(())
}
