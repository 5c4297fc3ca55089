use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Every notable state change produces an Event.
/// The tracker forwards the user-facing ones to the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Progress reached the task's target.
    TaskCompleted {
        task_id: u64,
        name: String,
        at: NaiveDateTime,
    },
    TimerStarted {
        task_id: u64,
        /// True when a paused timer for the same task was resumed.
        resumed: bool,
        at: NaiveDateTime,
    },
    TimerPaused {
        task_id: u64,
        elapsed_secs: f64,
        at: NaiveDateTime,
    },
    TimerStopped {
        task_id: u64,
        logged_secs: f64,
        entries: usize,
        at: NaiveDateTime,
    },
    /// An idle/suspend gap was detected and its excess discarded.
    IdleGapTrimmed {
        task_id: u64,
        gap_secs: f64,
        credited_secs: f64,
        at: NaiveDateTime,
    },
    /// Loaded timer pointed at a task that no longer exists.
    ActiveTimerDiscarded {
        task_id: u64,
        at: NaiveDateTime,
    },
    ReminderFired {
        reminder_id: u64,
        name: String,
        at: NaiveDateTime,
    },
    /// Unreadable state file was moved aside.
    StateQuarantined {
        path: Option<PathBuf>,
        at: NaiveDateTime,
    },
    /// Records that failed to decode were skipped at load.
    RecordsDropped {
        count: usize,
        at: NaiveDateTime,
    },
    ExportWritten {
        format: String,
        path: PathBuf,
        at: NaiveDateTime,
    },
}

impl Event {
    /// Title and body to show the user, if this event warrants a notification.
    pub fn notification(&self) -> Option<(String, String)> {
        match self {
            Event::TaskCompleted { name, .. } => {
                Some(("Task Complete!".into(), format!("Completed: {name}")))
            }
            Event::IdleGapTrimmed {
                gap_secs,
                credited_secs,
                ..
            } => Some((
                "Tracker paused gap trimmed".into(),
                format!(
                    "Idle gap of {}m capped to {}m",
                    (*gap_secs / 60.0) as u64,
                    (*credited_secs / 60.0) as u64
                ),
            )),
            Event::ActiveTimerDiscarded { .. } => Some((
                "Tracker".into(),
                "Saved timer cleared because its task is missing".into(),
            )),
            Event::ReminderFired { name, .. } => Some(("Reminder".into(), name.clone())),
            Event::StateQuarantined { path, .. } => Some((
                "Tracker data quarantined".into(),
                match path {
                    Some(p) => format!("Corrupt state moved to\n{}", p.display()),
                    None => "Corrupt state could not be moved aside".into(),
                },
            )),
            Event::RecordsDropped { count, .. } => Some((
                "Tracker data partially restored".into(),
                format!("{count} unreadable record(s) skipped"),
            )),
            Event::ExportWritten { format, path, .. } => Some((
                "Tracker export".into(),
                format!("{} written to {}", format.to_uppercase(), path.display()),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    #[test]
    fn idle_gap_notification_reports_minutes() {
        let event = Event::IdleGapTrimmed {
            task_id: 1,
            gap_secs: 7260.0,
            credited_secs: 3600.0,
            at: at(),
        };
        let (title, body) = event.notification().unwrap();
        assert_eq!(title, "Tracker paused gap trimmed");
        assert_eq!(body, "Idle gap of 121m capped to 60m");
    }

    #[test]
    fn dropped_records_notification_reports_count() {
        let event = Event::RecordsDropped { count: 2, at: at() };
        let (title, body) = event.notification().unwrap();
        assert_eq!(title, "Tracker data partially restored");
        assert_eq!(body, "2 unreadable record(s) skipped");
    }

    #[test]
    fn bookkeeping_events_are_silent() {
        let event = Event::TimerStarted {
            task_id: 1,
            resumed: false,
            at: at(),
        };
        assert!(event.notification().is_none());
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::ReminderFired {
            reminder_id: 3,
            name: "Stretch".into(),
            at: at(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ReminderFired");
        assert_eq!(json["at"], "2024-01-02T03:04:05");
    }
}
