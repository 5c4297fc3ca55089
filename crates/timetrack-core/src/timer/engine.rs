//! Stopwatch engine.
//!
//! The engine is a wall-clock-based state machine with at most one active
//! timer. It does not use internal threads - it arms a one-second tick through
//! the injected [`Scheduler`] and the owner calls [`TimerEngine::tick`] when
//! that tick comes due.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |           |
//!           +--> Idle <-+     (stop: elapsed flushed to time log entries)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerSettings::default());
//! engine.start(task_id, clock.now(), &mut queue);
//! // When TimerKey::Tick comes due:
//! engine.tick(clock.now(), &mut queue); // Some(Event) when an idle gap was trimmed
//! let entries = engine.stop(clock.now(), &mut queue).entries;
//! ```

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{secs_between, secs_to_duration};
use crate::events::Event;
use crate::ledger::{split_session, TimeLogEntry};
use crate::scheduler::{Scheduler, TimerHandle, TimerKey};

/// Longest session that will be logged, in seconds (16 hours).
pub const MAX_SESSION_SECS: f64 = 16.0 * 3600.0;

/// Most of a single idle gap that is credited as tracked time, in seconds.
pub const IDLE_GAP_CAP_SECS: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// The persisted in-flight timer.
///
/// `start_time` set means running; cleared means paused with the elapsed
/// time frozen in `elapsed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTimer {
    pub task_id: u64,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    /// Seconds accumulated before the current running segment.
    #[serde(default)]
    pub elapsed: f64,
    /// Last tick observed while running. Lets a restart detect the gap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<NaiveDateTime>,
    /// UTC offset, in seconds, that the timestamps above were read in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<i32>,
}

impl ActiveTimer {
    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }

    /// Accumulated plus current running segment, in seconds.
    pub fn elapsed_at(&self, now: NaiveDateTime) -> f64 {
        let running = self
            .start_time
            .map(|start| secs_between(start, now).max(0.0))
            .unwrap_or(0.0);
        self.elapsed.max(0.0) + running
    }
}

/// Tunables for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerSettings {
    pub tick_interval: Duration,
    pub idle_gap_cap_secs: f64,
    pub max_session_secs: f64,
    /// Sessions at or below this many seconds are not logged.
    pub min_logged_secs: f64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::seconds(1),
            idle_gap_cap_secs: IDLE_GAP_CAP_SECS,
            max_session_secs: MAX_SESSION_SECS,
            min_logged_secs: 1.0,
        }
    }
}

/// Result of a transition that may finalize a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub events: Vec<Event>,
    /// Time log entries to append to the ledger.
    pub entries: Vec<TimeLogEntry>,
}

impl Transition {
    fn merge(&mut self, other: Transition) {
        self.events.extend(other.events);
        self.entries.extend(other.entries);
    }
}

/// Single active stopwatch.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    settings: TimerSettings,
    active: Option<ActiveTimer>,
    /// Wall-clock time of the previous tick, only while running.
    last_tick: Option<NaiveDateTime>,
    tick_handle: Option<TimerHandle>,
}

impl TimerEngine {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            settings,
            active: None,
            last_tick: None,
            tick_handle: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        match &self.active {
            None => TimerState::Idle,
            Some(a) if a.is_running() => TimerState::Running,
            Some(_) => TimerState::Paused,
        }
    }

    pub fn active(&self) -> Option<&ActiveTimer> {
        self.active.as_ref()
    }

    pub fn task_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.task_id)
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    /// Live elapsed seconds for display.
    pub fn elapsed_secs(&self, now: NaiveDateTime) -> f64 {
        self.active
            .as_ref()
            .map(|a| a.elapsed_at(now))
            .unwrap_or(0.0)
    }

    /// Whether `handle` is the tick this engine is waiting for.
    pub fn owns_tick(&self, handle: TimerHandle) -> bool {
        self.tick_handle == Some(handle)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Reinstate a loaded timer. A running timer resumes ticking immediately.
    pub fn restore(
        &mut self,
        active: Option<ActiveTimer>,
        now: NaiveDateTime,
        scheduler: &mut dyn Scheduler,
    ) {
        self.cancel_tick(scheduler);
        self.last_tick = None;
        self.active = active;

        let resume = self
            .active
            .as_ref()
            .filter(|a| a.is_running())
            .map(|a| (a.task_id, a.last_seen.unwrap_or(now)));
        if let Some((task_id, last_seen)) = resume {
            self.last_tick = Some(last_seen);
            info!(task_id, %last_seen, "resuming running timer");
            self.arm_tick(scheduler);
        }
    }

    /// Start or resume timing `task_id`.
    ///
    /// Resuming the paused timer of the same task keeps its elapsed time.
    /// An existing timer for a different task is stopped and flushed first,
    /// so time is never carried over to another task.
    pub fn start(
        &mut self,
        task_id: u64,
        now: NaiveDateTime,
        scheduler: &mut dyn Scheduler,
    ) -> Transition {
        let mut out = Transition::default();

        match self.active.as_ref().map(|a| (a.task_id, a.is_running())) {
            Some((current, _)) if current != task_id => out.merge(self.stop(now, scheduler)),
            Some((_, true)) => return out, // Already running.
            _ => {}
        }

        let resumed = match self.active.as_mut() {
            Some(active) => {
                active.start_time = Some(now);
                active.last_seen = Some(now);
                true
            }
            None => {
                self.active = Some(ActiveTimer {
                    task_id,
                    start_time: Some(now),
                    elapsed: 0.0,
                    last_seen: Some(now),
                    utc_offset: None,
                });
                false
            }
        };

        self.last_tick = Some(now);
        self.arm_tick(scheduler);
        debug!(task_id, resumed, "timer started");
        out.events.push(Event::TimerStarted {
            task_id,
            resumed,
            at: now,
        });
        out
    }

    /// Freeze the running segment into the accumulated elapsed time.
    pub fn pause(&mut self, now: NaiveDateTime, scheduler: &mut dyn Scheduler) -> Option<Event> {
        let active = self.active.as_mut()?;
        let start = active.start_time.take()?;
        active.elapsed = active.elapsed.max(0.0) + secs_between(start, now).max(0.0);
        active.last_seen = None;
        let (task_id, elapsed_secs) = (active.task_id, active.elapsed);

        self.last_tick = None;
        self.cancel_tick(scheduler);
        debug!(task_id, elapsed_secs, "timer paused");
        Some(Event::TimerPaused {
            task_id,
            elapsed_secs,
            at: now,
        })
    }

    /// End the session and return the time log entries it produced.
    ///
    /// Elapsed time is clamped to `max_session_secs` and logged as the
    /// interval ending `now`, split at each local midnight. Sessions of
    /// `min_logged_secs` or less are dropped. No-op when idle.
    pub fn stop(&mut self, now: NaiveDateTime, scheduler: &mut dyn Scheduler) -> Transition {
        self.cancel_tick(scheduler);
        self.last_tick = None;

        let Some(active) = self.active.take() else {
            return Transition::default();
        };

        let raw = active.elapsed_at(now);
        let elapsed = raw.min(self.settings.max_session_secs);
        if raw > elapsed {
            warn!(
                task_id = active.task_id,
                raw_secs = raw,
                logged_secs = elapsed,
                "session exceeded maximum length, clamped"
            );
        }

        let entries = if elapsed > self.settings.min_logged_secs {
            split_session(active.task_id, now - secs_to_duration(elapsed), now)
        } else {
            Vec::new()
        };
        let logged_secs: f64 = entries.iter().map(|e| e.duration).sum();
        info!(
            task_id = active.task_id,
            logged_secs,
            entries = entries.len(),
            "timer stopped"
        );

        Transition {
            events: vec![Event::TimerStopped {
                task_id: active.task_id,
                logged_secs,
                entries: entries.len(),
                at: now,
            }],
            entries,
        }
    }

    /// Handle a due tick.
    ///
    /// Compares the wall-clock delta since the previous tick to the expected
    /// cadence. A gap over `idle_gap_cap_secs` means the host was suspended or
    /// stalled: the start of the running segment is moved forward so only
    /// `idle_gap_cap_secs` of the gap counts. Re-arms the next tick.
    pub fn tick(&mut self, now: NaiveDateTime, scheduler: &mut dyn Scheduler) -> Option<Event> {
        self.tick_handle = None;

        let active = self.active.as_mut()?;
        let start = active.start_time?;

        let mut event = None;
        if let Some(last) = self.last_tick {
            let gap = secs_between(last, now);
            let cap = self.settings.idle_gap_cap_secs;
            if gap > cap {
                let excess = gap - cap;
                active.start_time = Some(start + secs_to_duration(excess));
                warn!(
                    task_id = active.task_id,
                    gap_secs = gap,
                    credited_secs = cap,
                    "idle gap detected, excess discarded"
                );
                event = Some(Event::IdleGapTrimmed {
                    task_id: active.task_id,
                    gap_secs: gap,
                    credited_secs: cap,
                    at: now,
                });
            }
        }

        active.last_seen = Some(now);
        self.last_tick = Some(now);
        self.arm_tick(scheduler);
        event
    }

    /// Re-express the timer's timestamps in a new UTC offset.
    ///
    /// A daylight-saving change moves every wall-clock reading; moving the
    /// stored instants by the same amount keeps elapsed time and the idle-gap
    /// check in real seconds. The first call only records the offset.
    /// Returns true when timestamps were shifted.
    pub fn rezone(&mut self, offset_secs: i32, scheduler: &mut dyn Scheduler) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let previous = active.utc_offset.replace(offset_secs);
        let shift = match previous {
            Some(prev) if prev != offset_secs => {
                Duration::seconds(i64::from(offset_secs) - i64::from(prev))
            }
            _ => return false,
        };

        let moved = |t: NaiveDateTime| t.checked_add_signed(shift).unwrap_or(t);
        active.start_time = active.start_time.map(moved);
        active.last_seen = active.last_seen.map(moved);
        self.last_tick = self.last_tick.map(moved);
        let (task_id, running) = (active.task_id, active.is_running());

        info!(task_id, shift_secs = shift.num_seconds(), "UTC offset changed, timer shifted");
        if running {
            self.arm_tick(scheduler);
        }
        true
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn arm_tick(&mut self, scheduler: &mut dyn Scheduler) {
        self.cancel_tick(scheduler);
        self.tick_handle = Some(scheduler.arm(self.settings.tick_interval, TimerKey::Tick));
    }

    fn cancel_tick(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(handle) = self.tick_handle.take() {
            scheduler.cancel(handle);
        }
    }
}

/// `M:SS` stopwatch label; minutes are not wrapped into hours.
pub fn format_elapsed(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    format!("{}:{:02}", secs / 60, secs % 60)
}
