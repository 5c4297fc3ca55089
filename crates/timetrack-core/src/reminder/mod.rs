//! Reminder scheduling.
//!
//! Each enabled reminder has exactly one armed one-shot timer. The target is
//! picked in priority order:
//!
//! 1. a pending snooze (`snoozed_until` in the future),
//! 2. the stored `next_fire_at` if still in the future, so a countdown stays
//!    continuous across restarts and reschedules,
//! 3. the base rule: `now + time_hours` for relative reminders, or today at
//!    `time_hours` past midnight (tomorrow if already past) for daily ones.
//!
//! The chosen target is written back to `next_fire_at` before the timer is
//! armed. Firing clears snooze and target and re-arms from the base rule.

mod input;

pub use input::{parse_schedule, time_left};

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::clock::secs_to_duration;
use crate::error::ValidationError;
use crate::events::Event;
use crate::scheduler::{Scheduler, TimerHandle, TimerKey};

/// Shortest interval of a relative reminder, in hours (one minute).
pub const MIN_RELATIVE_HOURS: f64 = 1.0 / 60.0;

/// Longest interval of a relative reminder, in hours.
pub const MAX_RELATIVE_HOURS: f64 = 366.0 * 24.0;

/// Longest snooze, in minutes (one week).
pub const MAX_SNOOZE_MINUTES: u64 = 7 * 24 * 60;

fn default_true() -> bool {
    true
}

/// Check `time_hours` against the rules for its kind of reminder.
///
/// Daily times must fall inside one day. Relative intervals must be at
/// least a minute and at most a year.
pub fn check_time_hours(time_hours: f64, is_relative: bool) -> Result<(), ValidationError> {
    let invalid = |message: String| -> Result<(), ValidationError> {
        Err(ValidationError::invalid("time_hours", message))
    };

    if !time_hours.is_finite() || time_hours < 0.0 {
        return invalid(format!(
            "must be a non-negative number of hours, got {time_hours}"
        ));
    }
    if is_relative {
        if time_hours < MIN_RELATIVE_HOURS {
            return invalid(format!(
                "a relative reminder needs at least one minute, got {time_hours} hours"
            ));
        }
        if time_hours > MAX_RELATIVE_HOURS {
            return invalid(format!(
                "a relative reminder can be at most {MAX_RELATIVE_HOURS} hours, got {time_hours}"
            ));
        }
    } else if time_hours >= 24.0 {
        return invalid(format!("a daily time must be below 24 hours, got {time_hours}"));
    }
    Ok(())
}

/// A one-shot or recurring reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReminder")]
pub struct Reminder {
    pub id: u64,
    pub name: String,
    /// Hours from scheduling (relative) or hours after midnight (daily).
    pub time_hours: f64,
    pub created: Option<NaiveDateTime>,
    pub enabled: bool,
    pub snoozed_until: Option<NaiveDateTime>,
    pub sound: bool,
    pub is_relative: bool,
    pub next_fire_at: Option<NaiveDateTime>,
}

/// On-disk shape; everything but id, name and time is optional.
#[derive(Deserialize)]
struct RawReminder {
    id: u64,
    name: String,
    time_hours: f64,
    #[serde(default)]
    created: Option<NaiveDateTime>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    snoozed_until: Option<NaiveDateTime>,
    #[serde(default)]
    sound: bool,
    #[serde(default)]
    is_relative: bool,
    #[serde(default)]
    next_fire_at: Option<NaiveDateTime>,
}

impl TryFrom<RawReminder> for Reminder {
    type Error = ValidationError;

    fn try_from(raw: RawReminder) -> Result<Self, Self::Error> {
        check_time_hours(raw.time_hours, raw.is_relative)?;
        Ok(Self {
            id: raw.id,
            name: raw.name,
            time_hours: raw.time_hours,
            created: raw.created,
            enabled: raw.enabled,
            snoozed_until: raw.snoozed_until,
            sound: raw.sound,
            is_relative: raw.is_relative,
            next_fire_at: raw.next_fire_at,
        })
    }
}

impl Reminder {
    /// Target from the base rule alone, ignoring snooze and stored target.
    /// `None` if it falls outside the representable date range.
    pub fn base_target(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let offset = secs_to_duration(self.time_hours * 3600.0);
        if self.is_relative {
            return now.checked_add_signed(offset);
        }
        let target = now
            .date()
            .and_time(NaiveTime::MIN)
            .checked_add_signed(offset)?;
        if target <= now {
            target.checked_add_signed(Duration::days(1))
        } else {
            Some(target)
        }
    }

    fn pending_snooze(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        self.snoozed_until.filter(|t| *t > now)
    }

    fn pending_target(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        self.next_fire_at.filter(|t| *t > now)
    }

    /// Next fire time for display; `None` when disabled. Does not mutate.
    pub fn next_fire(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.enabled {
            return None;
        }
        self.pending_snooze(now)
            .or_else(|| self.pending_target(now))
            .or_else(|| self.base_target(now))
    }

    /// Resolve and store the next target. Clears a stale snooze.
    fn resolve_target(&mut self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let target = match self.pending_snooze(now).or_else(|| self.pending_target(now)) {
            Some(t) => t,
            None => {
                self.snoozed_until = None;
                self.base_target(now)?
            }
        };
        self.next_fire_at = Some(target);
        Some(target)
    }
}

/// Owns the reminder records and their armed timers.
#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    reminders: Vec<Reminder>,
    armed: HashMap<u64, TimerHandle>,
    /// Whether relative reminders re-arm after firing.
    relative_repeat: bool,
}

impl ReminderScheduler {
    pub fn new(reminders: Vec<Reminder>, relative_repeat: bool) -> Self {
        Self {
            reminders,
            armed: HashMap::new(),
            relative_repeat,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reminder> {
        self.reminders.iter()
    }

    pub fn get(&self, id: u64) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    pub fn to_vec(&self) -> Vec<Reminder> {
        self.reminders.clone()
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    pub fn is_armed(&self, id: u64) -> bool {
        self.armed.contains_key(&id)
    }

    /// Whether `handle` is the live timer for reminder `id`.
    pub fn owns(&self, id: u64, handle: TimerHandle) -> bool {
        self.armed.get(&id) == Some(&handle)
    }

    /// Add and arm a reminder. Ids continue from the highest existing one.
    ///
    /// `time_hours` must satisfy [`check_time_hours`].
    pub fn add(
        &mut self,
        name: &str,
        time_hours: f64,
        is_relative: bool,
        now: NaiveDateTime,
        scheduler: &mut dyn Scheduler,
    ) -> Result<u64, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName { entity: "reminder" });
        }
        check_time_hours(time_hours, is_relative)?;

        let id = self.reminders.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        self.reminders.push(Reminder {
            id,
            name: name.to_string(),
            time_hours,
            created: Some(now),
            enabled: true,
            snoozed_until: None,
            sound: false,
            is_relative,
            next_fire_at: None,
        });
        if let Err(e) = self.schedule(id, now, scheduler) {
            self.reminders.pop();
            return Err(e);
        }
        Ok(id)
    }

    /// Remove a reminder and cancel its timer.
    pub fn delete(&mut self, id: u64, scheduler: &mut dyn Scheduler) -> Option<Reminder> {
        self.cancel(id, scheduler);
        let idx = self.reminders.iter().position(|r| r.id == id)?;
        Some(self.reminders.remove(idx))
    }

    /// Flip `enabled`. Returns the new value.
    pub fn toggle(
        &mut self,
        id: u64,
        now: NaiveDateTime,
        scheduler: &mut dyn Scheduler,
    ) -> Result<bool, ValidationError> {
        let enabled = !self.find(id)?.enabled;
        self.set_enabled(id, enabled, now, scheduler)?;
        Ok(enabled)
    }

    /// Disabling cancels the timer but keeps the configuration; enabling
    /// re-arms from the base rule.
    pub fn set_enabled(
        &mut self,
        id: u64,
        enabled: bool,
        now: NaiveDateTime,
        scheduler: &mut dyn Scheduler,
    ) -> Result<(), ValidationError> {
        let rem = self.find_mut(id)?;
        if rem.enabled == enabled {
            return Ok(());
        }
        rem.enabled = enabled;
        if enabled {
            rem.snoozed_until = None;
            rem.next_fire_at = None;
            self.schedule(id, now, scheduler)
        } else {
            self.cancel(id, scheduler);
            Ok(())
        }
    }

    /// Postpone the next firing to `now + minutes`, overriding any stored target.
    /// At most [`MAX_SNOOZE_MINUTES`].
    pub fn snooze(
        &mut self,
        id: u64,
        minutes: u64,
        now: NaiveDateTime,
        scheduler: &mut dyn Scheduler,
    ) -> Result<NaiveDateTime, ValidationError> {
        let out_of_range = || {
            ValidationError::invalid(
                "minutes",
                format!("snooze must be at most {MAX_SNOOZE_MINUTES} minutes, got {minutes}"),
            )
        };
        if minutes > MAX_SNOOZE_MINUTES {
            return Err(out_of_range());
        }
        let until = i64::try_from(minutes)
            .ok()
            .and_then(|m| now.checked_add_signed(Duration::minutes(m)))
            .ok_or_else(out_of_range)?;
        let rem = self.find_mut(id)?;
        rem.snoozed_until = Some(until);
        rem.next_fire_at = None;
        self.schedule(id, now, scheduler)?;
        debug!(reminder_id = id, %until, "reminder snoozed");
        Ok(until)
    }

    /// Drop any snooze and stored target and fall back to the base rule.
    pub fn dismiss(
        &mut self,
        id: u64,
        now: NaiveDateTime,
        scheduler: &mut dyn Scheduler,
    ) -> Result<(), ValidationError> {
        let rem = self.find_mut(id)?;
        rem.snoozed_until = None;
        rem.next_fire_at = None;
        self.schedule(id, now, scheduler)
    }

    /// (Re)arm one reminder from its current fields.
    pub fn schedule(
        &mut self,
        id: u64,
        now: NaiveDateTime,
        scheduler: &mut dyn Scheduler,
    ) -> Result<(), ValidationError> {
        self.cancel(id, scheduler);
        let rem = self.find_mut(id)?;
        if !rem.enabled {
            return Ok(());
        }

        let Some(target) = rem.resolve_target(now) else {
            warn!(reminder_id = id, time_hours = rem.time_hours, "reminder target out of range, not armed");
            return Err(ValidationError::invalid(
                "time_hours",
                "next fire time is out of range",
            ));
        };
        let delay = (target - now).max(Duration::seconds(1));
        let handle = scheduler.arm(delay, TimerKey::Reminder(id));
        self.armed.insert(id, handle);
        debug!(reminder_id = id, %target, "reminder armed");
        Ok(())
    }

    /// (Re)arm every reminder, e.g. after loading state.
    pub fn schedule_all(&mut self, now: NaiveDateTime, scheduler: &mut dyn Scheduler) {
        self.cancel_all(scheduler);
        let ids: Vec<u64> = self.reminders.iter().map(|r| r.id).collect();
        for id in ids {
            // Ids come from the collection itself.
            let _ = self.schedule(id, now, scheduler);
        }
    }

    /// Follow a UTC offset change of `shift`. Relative targets and snoozes
    /// name a span of real time, so they move with the wall clock; daily
    /// reminders keep their wall-clock hour. Everything is re-armed.
    pub fn rezone(&mut self, shift: Duration, now: NaiveDateTime, scheduler: &mut dyn Scheduler) {
        let moved = |t: NaiveDateTime| t.checked_add_signed(shift).unwrap_or(t);
        for rem in &mut self.reminders {
            rem.snoozed_until = rem.snoozed_until.map(moved);
            if rem.is_relative {
                rem.next_fire_at = rem.next_fire_at.map(moved);
            }
        }
        debug!(shift_secs = shift.num_seconds(), "reminders rezoned");
        self.schedule_all(now, scheduler);
    }

    pub fn cancel_all(&mut self, scheduler: &mut dyn Scheduler) {
        for (_, handle) in self.armed.drain() {
            scheduler.cancel(handle);
        }
    }

    /// Handle a due reminder timer: report it and arm the next occurrence.
    pub fn fire(
        &mut self,
        id: u64,
        now: NaiveDateTime,
        scheduler: &mut dyn Scheduler,
    ) -> Option<Event> {
        self.armed.remove(&id);
        let relative_repeat = self.relative_repeat;
        let rem = self.reminders.iter_mut().find(|r| r.id == id)?;
        if !rem.enabled {
            return None;
        }

        rem.snoozed_until = None;
        rem.next_fire_at = None;
        let event = Event::ReminderFired {
            reminder_id: id,
            name: rem.name.clone(),
            at: now,
        };
        info!(reminder_id = id, name = %rem.name, "reminder fired");

        if rem.is_relative && !relative_repeat {
            rem.enabled = false;
        } else {
            let _ = self.schedule(id, now, scheduler);
        }
        Some(event)
    }

    fn cancel(&mut self, id: u64, scheduler: &mut dyn Scheduler) {
        if let Some(handle) = self.armed.remove(&id) {
            scheduler.cancel(handle);
        }
    }

    fn find(&self, id: u64) -> Result<&Reminder, ValidationError> {
        self.get(id)
            .ok_or(ValidationError::UnknownId { entity: "reminder", id })
    }

    fn find_mut(&mut self, id: u64) -> Result<&mut Reminder, ValidationError> {
        self.reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ValidationError::UnknownId { entity: "reminder", id })
    }
}
