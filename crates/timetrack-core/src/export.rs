//! Time log export.
//!
//! Both formats list every ledger entry in insertion order with the task's
//! name attached; entries whose task was deleted get `"Unknown"`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{StoreError, ValidationError};
use crate::ledger::TimeLogEntry;
use crate::storage::atomic_write;
use crate::task::Task;

const UNKNOWN_TASK: &str = "Unknown";
const CSV_HEADER: &str = "task_id,task_name,start,end,duration_seconds";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// Default output file name.
    pub fn file_name(self) -> String {
        format!("tracker_time_logs.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ValidationError::invalid(
                "format",
                format!("expected json or csv, got '{other}'"),
            )),
        }
    }
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    #[serde(flatten)]
    entry: &'a TimeLogEntry,
    task_name: &'a str,
}

fn name_lookup<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> BTreeMap<u64, &'a str> {
    tasks.into_iter().map(|t| (t.id, t.name.as_str())).collect()
}

/// Pretty JSON array of log records, each with a `task_name`.
pub fn render_json<'a>(
    entries: &[TimeLogEntry],
    tasks: impl IntoIterator<Item = &'a Task>,
) -> Result<String, serde_json::Error> {
    let names = name_lookup(tasks);
    let records: Vec<ExportRecord<'_>> = entries
        .iter()
        .map(|entry| ExportRecord {
            entry,
            task_name: names.get(&entry.task_id).copied().unwrap_or(UNKNOWN_TASK),
        })
        .collect();
    serde_json::to_string_pretty(&records)
}

/// CSV with a header row.
pub fn render_csv<'a>(entries: &[TimeLogEntry], tasks: impl IntoIterator<Item = &'a Task>) -> String {
    let names = name_lookup(tasks);
    let mut out = String::with_capacity(64 * (entries.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for e in entries {
        let name = names.get(&e.task_id).copied().unwrap_or(UNKNOWN_TASK);
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            e.task_id,
            csv_field(name),
            e.start.format(TIMESTAMP_FORMAT),
            e.end.format(TIMESTAMP_FORMAT),
            e.duration
        ));
    }
    out
}

/// Quote a field if it contains a comma, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render and atomically write an export to `path`.
pub fn write_export<'a>(
    format: ExportFormat,
    path: &Path,
    entries: &[TimeLogEntry],
    tasks: impl IntoIterator<Item = &'a Task>,
) -> Result<(), StoreError> {
    let body = match format {
        ExportFormat::Json => render_json(entries, tasks)?,
        ExportFormat::Csv => render_csv(entries, tasks),
    };
    atomic_write(path, body.as_bytes()).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}
