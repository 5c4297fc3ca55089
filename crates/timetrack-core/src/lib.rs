//! # Timetrack Core Library
//!
//! This library provides the core logic for a personal time tracker with
//! reminders. All operations are available through the standalone `timetrack`
//! CLI, which is a thin layer over the [`Tracker`] facade.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based stopwatch that requires the caller
//!   to dispatch its ticks; recovers from restarts and idle gaps
//! - **Reminders**: One-shot and daily reminders with snooze, whose countdowns
//!   survive restarts
//! - **Storage**: Atomic JSON state file and TOML-based configuration
//! - **Ledger**: Append-only time log, split at local midnight, with exports
//!
//! ## Key Components
//!
//! - [`Tracker`]: Facade owning every component; persists after each command
//! - [`TimerEngine`]: Stopwatch state machine
//! - [`ReminderScheduler`]: Reminder targets and timers
//! - [`StateStore`]: State file persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod export;
pub mod ledger;
pub mod notify;
pub mod reminder;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod timer;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, StoreError, ValidationError};
pub use events::Event;
pub use export::ExportFormat;
pub use ledger::{TimeLogEntry, TimeLogLedger};
pub use notify::{DesktopNotifier, LogNotifier, NotificationSink, NullNotifier, RecordingNotifier};
pub use reminder::{Reminder, ReminderScheduler};
pub use scheduler::{Scheduler, TimerHandle, TimerKey, TimerQueue};
pub use storage::{data_dir, Config, StateStore, TrackerState};
pub use task::{Task, TaskRegistry};
pub use timer::{ActiveTimer, TimerEngine, TimerSettings, TimerState};
pub use tracker::{TimerStatus, Tracker, TrackerOptions};
