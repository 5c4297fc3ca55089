use clap::Subcommand;
use serde::Serialize;
use timetrack_core::timer::format_elapsed;
use timetrack_core::{TimerState, TimerStatus};

use super::{open_tracker, CmdResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume timing a task (defaults to the selected task)
    Start {
        /// Task ID
        task_id: Option<u64>,
    },
    /// Pause the running timer
    Pause,
    /// Pause if running, otherwise start or resume
    Toggle {
        /// Task ID
        task_id: Option<u64>,
    },
    /// Stop the timer and log the session
    Stop,
    /// Print the current timer state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    state: TimerState,
    task_id: Option<u64>,
    task_name: Option<&'a str>,
    elapsed_secs: f64,
    label: &'a str,
}

pub fn run(action: TimerAction) -> CmdResult {
    let mut tracker = open_tracker()?;

    match action {
        TimerAction::Start { task_id } => {
            tracker.start_timer(task_id)?;
            print_status(&tracker.timer_status());
        }
        TimerAction::Pause => {
            if tracker.pause_timer() {
                print_status(&tracker.timer_status());
            } else {
                println!("Timer is not running");
            }
        }
        TimerAction::Toggle { task_id } => {
            tracker.toggle_timer(task_id)?;
            print_status(&tracker.timer_status());
        }
        TimerAction::Stop => {
            let entries = tracker.stop_timer();
            let logged: f64 = entries.iter().map(|e| e.duration).sum();
            match entries.first() {
                Some(entry) => println!(
                    "Logged {} to task {} ({} entries)",
                    format_elapsed(logged),
                    entry.task_id,
                    entries.len()
                ),
                None => println!("Nothing logged"),
            }
        }
        TimerAction::Status { json } => {
            let status = tracker.timer_status();
            if json {
                let out = StatusOutput {
                    state: status.state,
                    task_id: status.task_id,
                    task_name: status.task_name.as_deref(),
                    elapsed_secs: status.elapsed_secs,
                    label: &status.label,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_status(&status);
            }
        }
    }
    Ok(())
}

fn print_status(status: &TimerStatus) {
    let name = status.task_name.as_deref().unwrap_or("-");
    match status.state {
        TimerState::Idle => println!("idle"),
        TimerState::Running => println!("running  {}  {name}", status.label),
        TimerState::Paused => println!("paused   {}  {name}", status.label),
    }
}
