//! One-shot timer capability.
//!
//! Engines never sleep or spawn threads. They arm a [`TimerKey`] with a delay
//! through the [`Scheduler`] trait and the owner drains due keys from the
//! [`TimerQueue`] and dispatches them, one at a time, on its own thread.
//!
//! ```ignore
//! let handle = queue.arm(Duration::seconds(1), TimerKey::Tick);
//! // later, from the driving loop:
//! for (handle, key) in queue.take_due(clock.now()) { /* dispatch */ }
//! ```

use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::clock::Clock;

/// Identifies one arming of a timer. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// What a timer fires into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Stopwatch display/idle-gap tick.
    Tick,
    /// Reminder with the given id.
    Reminder(u64),
}

/// Arm/cancel capability injected into the engines.
pub trait Scheduler {
    /// Arm a one-shot timer firing `key` after `delay`.
    fn arm(&mut self, delay: Duration, key: TimerKey) -> TimerHandle;

    /// Cancel an armed timer. Unknown, fired or already cancelled handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}

#[derive(Debug, Clone)]
struct Armed {
    deadline: NaiveDateTime,
    key: TimerKey,
}

/// Deadline queue backing [`Scheduler`].
pub struct TimerQueue {
    clock: Arc<dyn Clock>,
    next_handle: u64,
    armed: BTreeMap<TimerHandle, Armed>,
}

impl TimerQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next_handle: 1,
            armed: BTreeMap::new(),
        }
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<NaiveDateTime> {
        self.armed.values().map(|a| a.deadline).min()
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub fn take_due(&mut self, now: NaiveDateTime) -> Vec<(TimerHandle, TimerKey)> {
        let mut due: Vec<(NaiveDateTime, TimerHandle, TimerKey)> = self
            .armed
            .iter()
            .filter(|(_, a)| a.deadline <= now)
            .map(|(h, a)| (a.deadline, *h, a.key))
            .collect();
        due.sort_by_key(|(deadline, handle, _)| (*deadline, *handle));

        for (_, handle, _) in &due {
            self.armed.remove(handle);
        }
        due.into_iter().map(|(_, h, k)| (h, k)).collect()
    }

    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.armed.contains_key(&handle)
    }

    pub fn deadline(&self, handle: TimerHandle) -> Option<NaiveDateTime> {
        self.armed.get(&handle).map(|a| a.deadline)
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

impl Scheduler for TimerQueue {
    /// A delay past the end of the calendar arms at the latest representable instant.
    fn arm(&mut self, delay: Duration, key: TimerKey) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let delay = delay.max(Duration::zero());
        let deadline = self
            .clock
            .now()
            .checked_add_signed(delay)
            .unwrap_or(NaiveDateTime::MAX);
        self.armed.insert(handle, Armed { deadline, key });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.armed.remove(&handle);
    }
}
