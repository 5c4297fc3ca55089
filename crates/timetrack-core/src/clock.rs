//! Wall-clock source.
//!
//! All engine timestamps are local wall-clock [`NaiveDateTime`] values: day
//! boundaries are local midnights and persisted values read the same way the
//! user sees them. The clock is injected so the timer and reminder engines can
//! be driven against a virtual clock in tests.
//!
//! Wall-clock readings jump when the UTC offset changes (daylight saving), so
//! the clock also reports the offset in effect. Stored instants are shifted by
//! the difference whenever it changes.

use chrono::{Duration, Local, NaiveDateTime};
use std::sync::{Arc, Mutex};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// Seconds east of UTC for the current local time.
    fn utc_offset_secs(&self) -> i32 {
        0
    }
}

/// Reads the host's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn utc_offset_secs(&self) -> i32 {
        Local::now().offset().local_minus_utc()
    }
}

/// Virtual clock that only moves when told to.
///
/// Clones share the same instant and UTC offset (initially zero).
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
    offset: Arc<Mutex<i32>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
            offset: Arc::new(Mutex::new(0)),
        }
    }

    /// Switch to a new UTC offset the way a daylight-saving transition does:
    /// the wall clock jumps by the difference.
    pub fn change_offset(&self, offset_secs: i32) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        let jump = i64::from(offset_secs) - i64::from(*offset);
        *offset = offset_secs;
        self.advance_secs(jump);
    }

    pub fn set(&self, at: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn utc_offset_secs(&self) -> i32 {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Seconds between two instants, negative if `to` precedes `from`.
pub fn secs_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    duration_secs(to - from)
}

/// Fractional seconds of a duration at microsecond precision.
pub fn duration_secs(d: Duration) -> f64 {
    match d.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => d.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Duration from fractional seconds, rounded to the microsecond.
pub fn secs_to_duration(secs: f64) -> Duration {
    if !secs.is_finite() {
        return Duration::zero();
    }
    Duration::microseconds((secs * 1_000_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(at(9, 0, 0));
        let other = clock.clone();
        clock.advance_secs(90);
        assert_eq!(other.now(), at(9, 1, 30));
    }

    #[test]
    fn offset_change_moves_wall_clock() {
        let clock = ManualClock::new(at(2, 59, 0));
        clock.change_offset(3600);
        assert_eq!(clock.now(), at(3, 59, 0));
        assert_eq!(clock.utc_offset_secs(), 3600);

        clock.change_offset(0);
        assert_eq!(clock.now(), at(2, 59, 0));
    }

    #[test]
    fn secs_roundtrip() {
        let d = secs_to_duration(1.5);
        assert_eq!(d, Duration::milliseconds(1500));
        assert_eq!(duration_secs(d), 1.5);
        assert_eq!(secs_between(at(10, 0, 0), at(9, 59, 0)), -60.0);
        assert_eq!(secs_to_duration(f64::NAN), Duration::zero());
    }
}
