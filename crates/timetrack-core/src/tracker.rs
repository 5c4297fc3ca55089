//! The tracker facade.
//!
//! [`Tracker`] owns every component plus the timer queue and is the only
//! thing front-ends talk to. Each mutating command persists the full state
//! before returning. Due timers are dispatched one at a time by
//! [`Tracker::run_due`]; the caller decides when to call it (a foreground
//! loop sleeping until [`Tracker::next_deadline`], or a test advancing a
//! virtual clock).
//!
//! Before touching the timer or the queue the tracker compares the clock's
//! UTC offset with the one it last saw, and shifts stored instants when a
//! daylight-saving change moved the wall clock.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clock::{secs_to_duration, Clock};
use crate::error::{StoreError, ValidationError};
use crate::events::Event;
use crate::export::{write_export, ExportFormat};
use crate::ledger::{TimeLogEntry, TimeLogLedger};
use crate::notify::NotificationSink;
use crate::reminder::{parse_schedule, Reminder, ReminderScheduler};
use crate::scheduler::{TimerKey, TimerQueue};
use crate::storage::{Config, StateStore, TrackerState};
use crate::task::{Task, TaskRegistry};
use crate::timer::{format_elapsed, TimerEngine, TimerSettings, TimerState, Transition};

/// Runtime options, usually taken from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerOptions {
    pub timer: TimerSettings,
    pub relative_repeat: bool,
    /// Minimum spacing between heartbeat saves of a running timer.
    pub heartbeat: Duration,
    pub default_snooze_minutes: u64,
    /// Where exports go when no path is given. Defaults to the state file's directory.
    pub export_dir: Option<PathBuf>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            timer: TimerSettings::default(),
            relative_repeat: true,
            heartbeat: Duration::seconds(60),
            default_snooze_minutes: 10,
            export_dir: None,
        }
    }
}

impl TrackerOptions {
    pub fn from_config(config: &Config, data_dir: &Path) -> Self {
        Self {
            timer: config.timer_settings(),
            relative_repeat: config.reminders.relative_repeat,
            heartbeat: secs_to_duration(config.timer.heartbeat_secs.max(1) as f64),
            default_snooze_minutes: config.reminders.default_snooze_minutes,
            export_dir: Some(config.export_dir(data_dir)),
        }
    }
}

/// Presentation view of the timer.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerStatus {
    pub state: TimerState,
    pub task_id: Option<u64>,
    pub task_name: Option<String>,
    pub elapsed_secs: f64,
    /// `M:SS`
    pub label: String,
}

pub struct Tracker {
    store: StateStore,
    clock: Arc<dyn Clock>,
    queue: TimerQueue,
    notifier: Box<dyn NotificationSink>,
    options: TrackerOptions,

    tasks: TaskRegistry,
    ledger: TimeLogLedger,
    timer: TimerEngine,
    reminders: ReminderScheduler,
    selected_task_id: Option<u64>,

    /// UTC offset the in-memory instants are expressed in.
    zone_offset: i32,
    last_saved: Option<NaiveDateTime>,
}

impl Tracker {
    /// Load state, repair dangling references, resume the timer and re-arm
    /// reminders. Saves straight away if any of that changed the state.
    pub fn open(
        mut store: StateStore,
        options: TrackerOptions,
        clock: Arc<dyn Clock>,
        notifier: Box<dyn NotificationSink>,
    ) -> Self {
        let loaded = store.load();
        let now = clock.now();
        let mut events = Vec::new();

        if loaded.quarantined {
            events.push(Event::StateQuarantined {
                path: loaded.quarantine_path.clone(),
                at: now,
            });
        }
        if loaded.dropped_records > 0 {
            warn!(count = loaded.dropped_records, "state loaded with unreadable records skipped");
            events.push(Event::RecordsDropped {
                count: loaded.dropped_records,
                at: now,
            });
        }

        let state = loaded.state.clone();
        let tasks = TaskRegistry::from_parts(state.tasks, state.next_task_id);

        let active = match state.active_timer {
            Some(active) if !tasks.contains(active.task_id) => {
                warn!(task_id = active.task_id, "saved timer references a missing task, clearing");
                events.push(Event::ActiveTimerDiscarded {
                    task_id: active.task_id,
                    at: now,
                });
                None
            }
            other => other,
        };
        let selected_task_id = state.selected_task_id.filter(|id| tasks.contains(*id));

        let mut tracker = Self {
            queue: TimerQueue::new(Arc::clone(&clock)),
            timer: TimerEngine::new(options.timer.clone()),
            reminders: ReminderScheduler::new(state.reminders, options.relative_repeat),
            ledger: TimeLogLedger::new(state.time_logs),
            tasks,
            selected_task_id,
            store,
            clock,
            notifier,
            options,
            zone_offset: 0,
            last_saved: None,
        };
        tracker.zone_offset = tracker.clock.utc_offset_secs();

        tracker.timer.restore(active, now, &mut tracker.queue);
        tracker.sync_zone();
        tracker.reminders.schedule_all(tracker.now(), &mut tracker.queue);
        tracker.emit(&events);

        if tracker.snapshot() != loaded.state {
            tracker.persist();
        }
        tracker
    }

    /// Open using the state file and options named by `config`.
    pub fn from_config(
        config: &Config,
        data_dir: &Path,
        clock: Arc<dyn Clock>,
        notifier: Box<dyn NotificationSink>,
    ) -> Self {
        Self::open(
            StateStore::new(config.state_path(data_dir)),
            TrackerOptions::from_config(config, data_dir),
            clock,
            notifier,
        )
    }

    // ── Views ────────────────────────────────────────────────────────

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn ledger(&self) -> &TimeLogLedger {
        &self.ledger
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn selected_task_id(&self) -> Option<u64> {
        self.selected_task_id
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    pub fn timer_status(&self) -> TimerStatus {
        let task_id = self.timer.task_id();
        let elapsed_secs = self.timer.elapsed_secs(self.now());
        TimerStatus {
            state: self.timer.state(),
            task_id,
            task_name: task_id
                .and_then(|id| self.tasks.get(id))
                .map(|t| t.name.clone()),
            elapsed_secs,
            label: format_elapsed(elapsed_secs),
        }
    }

    /// Logged seconds per task for `date`, in task order. Tasks with no
    /// time that day are included with zero.
    pub fn day_summary(&self, date: NaiveDate) -> Vec<(&Task, f64)> {
        let totals = self.ledger.task_totals(date);
        self.tasks
            .iter()
            .map(|t| (t, totals.get(&t.id).copied().unwrap_or(0.0)))
            .collect()
    }

    /// Canonical serialized form of the current state.
    pub fn snapshot(&self) -> TrackerState {
        TrackerState {
            tasks: self.tasks.to_vec(),
            time_logs: self.ledger.entries().to_vec(),
            reminders: self.reminders.to_vec(),
            active_timer: self.timer.active().cloned(),
            next_task_id: self.tasks.next_id(),
            selected_task_id: self.selected_task_id,
        }
    }

    /// Earliest armed timer, if any.
    pub fn next_deadline(&self) -> Option<NaiveDateTime> {
        self.queue.next_deadline()
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn add_task(&mut self, name: &str, units: f64) -> Result<u64, ValidationError> {
        let now = self.now();
        let id = self.tasks.add(name, units, now)?;
        self.persist();
        Ok(id)
    }

    pub fn increment_task(&mut self, id: u64) -> Result<(), ValidationError> {
        let event = self.tasks.increment(id, self.now())?;
        self.persist();
        if let Some(event) = event {
            info!(task_id = id, "task completed");
            self.emit(&[event]);
        }
        Ok(())
    }

    pub fn decrement_task(&mut self, id: u64) -> Result<(), ValidationError> {
        self.tasks.decrement(id)?;
        self.persist();
        Ok(())
    }

    pub fn rename_task(&mut self, id: u64, name: &str) -> Result<(), ValidationError> {
        self.tasks.rename(id, name)?;
        self.persist();
        Ok(())
    }

    pub fn set_task_archived(&mut self, id: u64, archived: bool) -> Result<(), ValidationError> {
        self.tasks.set_archived(id, archived)?;
        self.persist();
        Ok(())
    }

    /// Delete a task. A timer running on it is stopped first so its time is
    /// logged; existing log entries are kept.
    pub fn delete_task(&mut self, id: u64) -> Result<Task, ValidationError> {
        if !self.tasks.contains(id) {
            return Err(ValidationError::UnknownId { entity: "task", id });
        }

        if self.timer.task_id() == Some(id) {
            self.sync_zone();
            let now = self.now();
            let transition = self.timer.stop(now, &mut self.queue);
            self.apply(transition);
        }
        if self.selected_task_id == Some(id) {
            self.selected_task_id = None;
        }

        let task = self
            .tasks
            .delete(id)
            .ok_or(ValidationError::UnknownId { entity: "task", id })?;
        info!(task_id = id, name = %task.name, "task deleted");
        self.persist();
        Ok(task)
    }

    /// Choose the task `timer start` uses when none is given.
    pub fn select_task(&mut self, id: Option<u64>) -> Result<(), ValidationError> {
        if let Some(id) = id {
            self.require_task(id)?;
        }
        self.selected_task_id = id;
        self.persist();
        Ok(())
    }

    // ── Timer ────────────────────────────────────────────────────────

    /// Start or resume timing. Falls back to the selected task.
    pub fn start_timer(&mut self, task_id: Option<u64>) -> Result<(), ValidationError> {
        let id = task_id
            .or(self.selected_task_id)
            .ok_or(ValidationError::NoTaskSelected)?;
        self.require_task(id)?;

        self.sync_zone();
        let now = self.now();
        let transition = self.timer.start(id, now, &mut self.queue);
        self.sync_zone();
        self.selected_task_id = Some(id);
        self.apply(transition);
        self.persist();
        Ok(())
    }

    /// Returns false when nothing was running.
    pub fn pause_timer(&mut self) -> bool {
        self.sync_zone();
        let now = self.now();
        let paused = self.timer.pause(now, &mut self.queue);
        if paused.is_some() {
            self.persist();
        }
        paused.is_some()
    }

    /// Pause when running, otherwise start or resume.
    pub fn toggle_timer(&mut self, task_id: Option<u64>) -> Result<(), ValidationError> {
        if self.timer.state() == TimerState::Running {
            self.pause_timer();
            Ok(())
        } else {
            self.start_timer(task_id.or(self.timer.task_id()))
        }
    }

    /// Stop the timer and return the entries that were logged.
    pub fn stop_timer(&mut self) -> Vec<TimeLogEntry> {
        if self.timer.state() == TimerState::Idle {
            return Vec::new();
        }
        self.sync_zone();
        let now = self.now();
        let transition = self.timer.stop(now, &mut self.queue);
        let entries = transition.entries.clone();
        self.apply(transition);
        self.persist();
        entries
    }

    // ── Reminders ────────────────────────────────────────────────────

    pub fn add_reminder(
        &mut self,
        name: &str,
        time_hours: f64,
        is_relative: bool,
    ) -> Result<u64, ValidationError> {
        let now = self.now();
        let id = self
            .reminders
            .add(name, time_hours, is_relative, now, &mut self.queue)?;
        self.persist();
        Ok(id)
    }

    /// Add a reminder from typed input such as `9:30`, `0:15` or `45`.
    pub fn add_reminder_from_input(&mut self, name: &str, input: &str) -> Result<u64, ValidationError> {
        let (hours, relative) = parse_schedule(input)?;
        self.add_reminder(name, hours, relative)
    }

    pub fn delete_reminder(&mut self, id: u64) -> Result<Reminder, ValidationError> {
        let removed = self
            .reminders
            .delete(id, &mut self.queue)
            .ok_or(ValidationError::UnknownId { entity: "reminder", id })?;
        self.persist();
        Ok(removed)
    }

    /// Returns the new enabled flag.
    pub fn toggle_reminder(&mut self, id: u64) -> Result<bool, ValidationError> {
        let now = self.now();
        let enabled = self.reminders.toggle(id, now, &mut self.queue)?;
        self.persist();
        Ok(enabled)
    }

    /// Snooze for `minutes`, or the configured default. Returns the new target.
    pub fn snooze_reminder(
        &mut self,
        id: u64,
        minutes: Option<u64>,
    ) -> Result<NaiveDateTime, ValidationError> {
        let now = self.now();
        let minutes = minutes.unwrap_or(self.options.default_snooze_minutes);
        let until = self.reminders.snooze(id, minutes, now, &mut self.queue)?;
        self.persist();
        Ok(until)
    }

    pub fn dismiss_reminder(&mut self, id: u64) -> Result<(), ValidationError> {
        let now = self.now();
        self.reminders.dismiss(id, now, &mut self.queue)?;
        self.persist();
        Ok(())
    }

    /// Next fire time of a reminder for countdown display.
    pub fn reminder_next_fire(&self, id: u64) -> Option<NaiveDateTime> {
        self.reminders.get(id)?.next_fire(self.now())
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Dispatch every timer that is due, earliest first, and return the
    /// events they produced.
    pub fn run_due(&mut self) -> Vec<Event> {
        self.sync_zone();
        let now = self.now();
        let mut events = Vec::new();

        for (handle, key) in self.queue.take_due(now) {
            match key {
                TimerKey::Tick if self.timer.owns_tick(handle) => {
                    if let Some(event) = self.timer.tick(now, &mut self.queue) {
                        self.emit(std::slice::from_ref(&event));
                        events.push(event);
                        self.persist();
                    } else if self.heartbeat_due(now) {
                        self.persist();
                    }
                }
                TimerKey::Reminder(id) if self.reminders.owns(id, handle) => {
                    if let Some(event) = self.reminders.fire(id, now, &mut self.queue) {
                        self.emit(std::slice::from_ref(&event));
                        events.push(event);
                    }
                    self.persist();
                }
                _ => {}
            }
        }
        events
    }

    // ── Export ───────────────────────────────────────────────────────

    /// Default export location for `format`.
    pub fn export_path(&self, format: ExportFormat) -> PathBuf {
        let dir = self.options.export_dir.clone().unwrap_or_else(|| {
            self.store
                .path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        });
        dir.join(format.file_name())
    }

    /// Write the time log export and notify. Returns the path written.
    pub fn export(&mut self, format: ExportFormat, path: Option<&Path>) -> Result<PathBuf, StoreError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.export_path(format));
        if let Err(e) = write_export(format, &path, self.ledger.entries(), self.tasks.iter()) {
            error!("export failed: {e}");
            return Err(e);
        }
        info!(%format, path = %path.display(), "export written");
        let event = Event::ExportWritten {
            format: format.to_string(),
            path: path.clone(),
            at: self.now(),
        };
        self.emit(&[event]);
        Ok(path)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Save the full state. Failures are logged; memory stays authoritative.
    ///
    /// A file rewritten by another process since our last load or save is
    /// left alone; the owner of a long-lived tracker reopens it instead.
    pub fn persist(&mut self) {
        if self.store.changed_on_disk() {
            warn!(path = %self.store.path().display(), "state file changed on disk, not overwriting");
            return;
        }
        let state = self.snapshot();
        match self.store.save(&state) {
            Ok(()) => self.last_saved = Some(self.now()),
            Err(e) => error!("failed to save state: {e}"),
        }
    }

    /// Follow a change of the clock's UTC offset. The timer compares against
    /// the offset it stored, reminders against the one this tracker last saw.
    fn sync_zone(&mut self) {
        let offset = self.clock.utc_offset_secs();
        self.timer.rezone(offset, &mut self.queue);
        if offset != self.zone_offset {
            let shift = Duration::seconds(i64::from(offset) - i64::from(self.zone_offset));
            info!(from = self.zone_offset, to = offset, "UTC offset changed");
            self.zone_offset = offset;
            self.last_saved = self
                .last_saved
                .map(|t| t.checked_add_signed(shift).unwrap_or(t));
            let now = self.now();
            self.reminders.rezone(shift, now, &mut self.queue);
        }
    }

    fn heartbeat_due(&self, now: NaiveDateTime) -> bool {
        match self.last_saved {
            Some(saved) => now - saved >= self.options.heartbeat,
            None => true,
        }
    }

    fn apply(&mut self, transition: Transition) {
        self.ledger.extend(transition.entries);
        self.emit(&transition.events);
    }

    fn emit(&self, events: &[Event]) {
        for event in events {
            if let Some((title, body)) = event.notification() {
                self.notifier.notify(&title, &body);
            }
        }
    }

    fn require_task(&self, id: u64) -> Result<(), ValidationError> {
        if self.tasks.contains(id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownId { entity: "task", id })
        }
    }
}
