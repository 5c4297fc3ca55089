//! Append-only time log.
//!
//! Finalized timer sessions land here as [`TimeLogEntry`] records, each
//! bounded by local midnight so per-day aggregation never has to split
//! anything. Entries are never edited or removed; deleting a task leaves its
//! history in place.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::{secs_between, secs_to_duration};
use crate::error::ValidationError;

/// One finalized, single-day slice of a timed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeLogEntry")]
pub struct TimeLogEntry {
    pub task_id: u64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Seconds, always positive.
    pub duration: f64,
}

/// On-disk shape; `end` is optional in older files.
#[derive(Deserialize)]
struct RawTimeLogEntry {
    task_id: u64,
    start: NaiveDateTime,
    #[serde(default)]
    end: Option<NaiveDateTime>,
    duration: f64,
}

impl TryFrom<RawTimeLogEntry> for TimeLogEntry {
    type Error = ValidationError;

    fn try_from(raw: RawTimeLogEntry) -> Result<Self, Self::Error> {
        if !raw.duration.is_finite() || raw.duration <= 0.0 {
            return Err(ValidationError::invalid(
                "duration",
                format!("must be positive, got {}", raw.duration),
            ));
        }
        Ok(Self {
            task_id: raw.task_id,
            start: raw.start,
            end: raw
                .end
                .unwrap_or_else(|| raw.start + secs_to_duration(raw.duration)),
            duration: raw.duration,
        })
    }
}

/// Split `[start, end)` into one entry per local calendar day it touches.
///
/// Every boundary falls exactly on midnight; the durations sum to
/// `end - start`. Empty or inverted intervals produce nothing.
pub fn split_session(task_id: u64, start: NaiveDateTime, end: NaiveDateTime) -> Vec<TimeLogEntry> {
    let mut entries = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let next_midnight = cursor
            .date()
            .succ_opt()
            .map(|d| d.and_time(NaiveTime::MIN));
        let seg_end = match next_midnight {
            Some(midnight) if midnight < end => midnight,
            _ => end,
        };

        let duration = secs_between(cursor, seg_end);
        if duration > 0.0 {
            entries.push(TimeLogEntry {
                task_id,
                start: cursor,
                end: seg_end,
                duration,
            });
        }
        cursor = seg_end;
    }
    entries
}

/// Ordered, append-only sequence of [`TimeLogEntry`].
#[derive(Debug, Clone, Default)]
pub struct TimeLogLedger {
    entries: Vec<TimeLogEntry>,
}

impl TimeLogLedger {
    pub fn new(entries: Vec<TimeLogEntry>) -> Self {
        Self { entries }
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = TimeLogEntry>) {
        self.entries.extend(entries);
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[TimeLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-task seconds for entries starting on `date`.
    pub fn task_totals(&self, date: NaiveDate) -> BTreeMap<u64, f64> {
        let mut totals = BTreeMap::new();
        for e in self.entries.iter().filter(|e| e.start.date() == date) {
            *totals.entry(e.task_id).or_insert(0.0) += e.duration;
        }
        totals
    }

    /// All-task seconds per day in `from ..= to`. Days without time are present with 0.
    pub fn daily_totals(&self, from: NaiveDate, to: NaiveDate) -> BTreeMap<NaiveDate, f64> {
        let mut totals: BTreeMap<NaiveDate, f64> =
            from.iter_days().take_while(|d| *d <= to).map(|d| (d, 0.0)).collect();
        for e in &self.entries {
            if let Some(total) = totals.get_mut(&e.start.date()) {
                *total += e.duration;
            }
        }
        totals
    }

    /// Seconds per day-of-month for days in the given month that have any time.
    pub fn month_totals(&self, year: i32, month: u32) -> BTreeMap<u32, f64> {
        let mut totals = BTreeMap::new();
        for e in &self.entries {
            let date = e.start.date();
            if date.year() == year && date.month() == month {
                *totals.entry(date.day()).or_insert(0.0) += e.duration;
            }
        }
        totals
    }
}

/// `H:MM` as used for per-task daily totals.
pub fn format_hours_minutes(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    format!("{}:{:02}", secs / 3600, (secs % 3600) / 60)
}
