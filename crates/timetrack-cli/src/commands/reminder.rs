use clap::Subcommand;
use timetrack_core::reminder::time_left;
use timetrack_core::Reminder;

use super::{open_tracker, CmdResult};

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Add a reminder
    Add {
        /// Reminder text
        name: String,
        /// `h:mm` for a daily time, `0:mm` or bare minutes for "in N minutes"
        when: String,
    },
    /// Delete a reminder
    Delete {
        /// Reminder ID
        id: u64,
    },
    /// Enable or disable a reminder
    Toggle {
        /// Reminder ID
        id: u64,
    },
    /// Postpone the next firing
    Snooze {
        /// Reminder ID
        id: u64,
        /// Minutes (default: reminders.default_snooze_minutes)
        #[arg(long)]
        minutes: Option<u64>,
    },
    /// Clear any snooze and return to the regular schedule
    Dismiss {
        /// Reminder ID
        id: u64,
    },
    /// List reminders with countdowns
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: ReminderAction) -> CmdResult {
    let mut tracker = open_tracker()?;

    match action {
        ReminderAction::Add { name, when } => {
            let id = tracker.add_reminder_from_input(&name, &when)?;
            if let Some(next) = tracker.reminder_next_fire(id) {
                println!("Reminder created: {id} (next at {})", next.format("%Y-%m-%d %H:%M"));
            }
        }
        ReminderAction::Delete { id } => {
            let removed = tracker.delete_reminder(id)?;
            println!("Reminder deleted: {} ({})", removed.id, removed.name);
        }
        ReminderAction::Toggle { id } => {
            let enabled = tracker.toggle_reminder(id)?;
            println!("Reminder {id} {}", if enabled { "enabled" } else { "disabled" });
        }
        ReminderAction::Snooze { id, minutes } => {
            let until = tracker.snooze_reminder(id, minutes)?;
            println!("Reminder {id} snoozed until {}", until.format("%H:%M:%S"));
        }
        ReminderAction::Dismiss { id } => {
            tracker.dismiss_reminder(id)?;
            if let Some(next) = tracker.reminder_next_fire(id) {
                println!("Reminder {id} next at {}", next.format("%Y-%m-%d %H:%M"));
            }
        }
        ReminderAction::List { json } => {
            let now = tracker.now();
            let reminders: Vec<&Reminder> = tracker.reminders().iter().collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&reminders)?);
            } else if reminders.is_empty() {
                println!("No reminders");
            } else {
                for rem in reminders {
                    let countdown = rem
                        .next_fire(now)
                        .map(|next| time_left(next, now))
                        .unwrap_or_else(|| "off".to_string());
                    println!(
                        "{:>4}  {:>8}  {:<9}  {}",
                        rem.id,
                        countdown,
                        schedule_label(rem),
                        rem.name
                    );
                }
            }
        }
    }
    Ok(())
}

/// `every 0:15` or `daily 9:30`
fn schedule_label(rem: &Reminder) -> String {
    let total_minutes = (rem.time_hours * 60.0).round() as u64;
    let (h, m) = (total_minutes / 60, total_minutes % 60);
    if rem.is_relative {
        format!("every {h}:{m:02}")
    } else {
        format!("daily {h}:{m:02}")
    }
}
