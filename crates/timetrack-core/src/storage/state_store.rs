//! Persisted tracker state.
//!
//! The whole state is one pretty-printed JSON document. Saves go through a
//! temp file, fsync and rename so a crash never leaves a half-written file;
//! the previous version is kept as `.bak`. Loading is lenient: a record that
//! fails to decode is dropped on its own, and a file that is not a JSON
//! object at all is moved aside as `<stem>-<epoch>.corrupt`.
//!
//! The store remembers a fingerprint of the bytes it last read or wrote, so
//! callers can tell when another process has replaced the file since.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::ledger::TimeLogEntry;
use crate::reminder::Reminder;
use crate::task::Task;
use crate::timer::ActiveTimer;

/// Canonical serialized form of everything the tracker persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    pub tasks: Vec<Task>,
    pub time_logs: Vec<TimeLogEntry>,
    pub reminders: Vec<Reminder>,
    pub active_timer: Option<ActiveTimer>,
    pub next_task_id: u64,
    pub selected_task_id: Option<u64>,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            time_logs: Vec::new(),
            reminders: Vec::new(),
            active_timer: None,
            next_task_id: 1,
            selected_task_id: None,
        }
    }
}

/// What [`StateStore::load`] found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loaded {
    pub state: TrackerState,
    /// Individual records skipped because they failed to decode.
    pub dropped_records: usize,
    /// The file was unreadable as a state document and was moved aside.
    pub quarantined: bool,
    /// Where it was moved; `None` if the rename itself failed.
    pub quarantine_path: Option<PathBuf>,
}

/// Load/save of the state file at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    /// Fingerprint of the file as last loaded or saved; `None` when absent.
    synced: Option<u64>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            synced: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("bak")
    }

    /// True when the file differs from what this store last loaded or saved.
    pub fn changed_on_disk(&self) -> bool {
        fingerprint_file(&self.path) != self.synced
    }

    /// Atomically replace the state file, keeping the old one as `.bak`.
    pub fn save(&mut self, state: &TrackerState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(state)?;

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, self.backup_path()) {
                warn!(path = %self.path.display(), "failed to write backup: {e}");
            }
        }

        atomic_write(&self.path, &json).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.synced = Some(fingerprint(&json));
        debug!(
            path = %self.path.display(),
            tasks = state.tasks.len(),
            logs = state.time_logs.len(),
            "state saved"
        );
        Ok(())
    }

    /// Load the state file. Never fails: problems are logged and reported
    /// through [`Loaded`].
    pub fn load(&mut self) -> Loaded {
        self.synced = None;
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no state file, starting empty");
                return Loaded::default();
            }
            Err(source) => {
                let err = StoreError::Read {
                    path: self.path.clone(),
                    source,
                };
                error!("{err}");
                return Loaded::default();
            }
        };

        let root = match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => return self.quarantine("top level is not an object"),
            Err(e) => return self.quarantine(&e.to_string()),
        };
        self.synced = Some(fingerprint(&bytes));

        let mut dropped = 0;
        let tasks: Vec<Task> = decode_records(root.get("tasks"), "task", &mut dropped);
        let time_logs: Vec<TimeLogEntry> =
            decode_records(root.get("time_logs"), "time log", &mut dropped);
        let reminders: Vec<Reminder> =
            decode_records(root.get("reminders"), "reminder", &mut dropped);

        let active_timer = match root.get("active_timer") {
            Some(v @ serde_json::Value::Object(_)) => {
                match serde_json::from_value::<ActiveTimer>(v.clone()) {
                    Ok(t) => Some(t),
                    Err(e) => {
                        warn!("dropping unreadable active timer: {e}");
                        None
                    }
                }
            }
            _ => None,
        };

        let max_id = tasks.iter().map(|t| t.id).max().unwrap_or(0);
        let next_task_id = root
            .get("next_task_id")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(1)
            .max(max_id + 1);
        let selected_task_id = root
            .get("selected_task_id")
            .and_then(serde_json::Value::as_u64);

        if dropped > 0 {
            warn!(dropped, path = %self.path.display(), "skipped malformed records");
        }
        info!(
            tasks = tasks.len(),
            logs = time_logs.len(),
            reminders = reminders.len(),
            "state loaded"
        );

        Loaded {
            state: TrackerState {
                tasks,
                time_logs,
                reminders,
                active_timer,
                next_task_id,
                selected_task_id,
            },
            dropped_records: dropped,
            quarantined: false,
            quarantine_path: None,
        }
    }

    fn quarantine(&self, message: &str) -> Loaded {
        let err = StoreError::Corrupt {
            path: self.path.clone(),
            message: message.to_string(),
        };
        error!("{err}");

        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".into());
        let target = self.path.with_file_name(format!(
            "{stem}-{}.corrupt",
            chrono::Utc::now().timestamp()
        ));

        let moved = match fs::rename(&self.path, &target) {
            Ok(()) => {
                warn!(to = %target.display(), "corrupt state file quarantined");
                Some(target)
            }
            Err(e) => {
                error!(path = %self.path.display(), "failed to quarantine state file: {e}");
                None
            }
        };

        Loaded {
            quarantined: true,
            quarantine_path: moved,
            ..Loaded::default()
        }
    }
}

fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

fn fingerprint_file(path: &Path) -> Option<u64> {
    fs::read(path).ok().map(|bytes| fingerprint(&bytes))
}

/// Decode each element of a JSON array on its own, skipping failures.
fn decode_records<T: DeserializeOwned>(
    value: Option<&serde_json::Value>,
    kind: &str,
    dropped: &mut usize,
) -> Vec<T> {
    let Some(items) = value.and_then(serde_json::Value::as_array) else {
        if value.is_some_and(|v| !v.is_null()) {
            warn!("expected a list of {kind} records, ignoring");
        }
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("dropping malformed {kind} record: {e}");
                *dropped += 1;
                None
            }
        })
        .collect()
}

/// Write `bytes` to `<path>.tmp`, fsync, then rename over `path`.
///
/// The temp file is removed if any step fails. Parent directories are created.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_state() -> TrackerState {
        let at = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        TrackerState {
            tasks: vec![Task {
                id: 3,
                name: "Write report".into(),
                target_units: 4.0,
                done_units: 1.0,
                created_at: Some(at),
                archived: false,
                is_today: true,
            }],
            time_logs: vec![TimeLogEntry {
                task_id: 3,
                start: at,
                end: at + chrono::Duration::seconds(1500),
                duration: 1500.0,
            }],
            reminders: vec![Reminder {
                id: 1,
                name: "Stretch".into(),
                time_hours: 0.5,
                created: Some(at),
                enabled: true,
                snoozed_until: None,
                sound: false,
                is_relative: true,
                next_fire_at: Some(at + chrono::Duration::minutes(30)),
            }],
            active_timer: Some(ActiveTimer {
                task_id: 3,
                start_time: None,
                elapsed: 42.5,
                last_seen: None,
                utc_offset: Some(3600),
            }),
            next_task_id: 4,
            selected_task_id: Some(3),
        }
    }

    #[test]
    fn missing_file_loads_empty_state() {
        let dir = TempDir::new().unwrap();
        let loaded = StateStore::new(dir.path().join("none.json")).load();
        assert_eq!(loaded, Loaded::default());
        assert_eq!(loaded.state.next_task_id, 1);
    }

    #[test]
    fn save_then_load_reproduces_state() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::new(dir.path().join("sub").join("tracker_data.json"));
        let state = sample_state();
        store.save(&state).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.state, state);
        assert_eq!(loaded.dropped_records, 0);
        assert!(!dir.path().join("sub").join("tracker_data.json.tmp").exists());
    }

    #[test]
    fn second_save_keeps_backup_of_previous() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::new(dir.path().join("tracker_data.json"));
        let mut state = sample_state();
        store.save(&state).unwrap();
        state.next_task_id = 9;
        store.save(&state).unwrap();

        let backup = StateStore::new(store.backup_path()).load();
        assert_eq!(backup.state.next_task_id, 4);
        assert_eq!(store.load().state.next_task_id, 9);
    }

    #[test]
    fn detects_writes_from_another_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracker_data.json");
        let mut ours = StateStore::new(&path);
        assert!(!ours.changed_on_disk());

        let mut state = sample_state();
        ours.save(&state).unwrap();
        assert!(!ours.changed_on_disk());

        let mut theirs = StateStore::new(&path);
        theirs.load();
        state.next_task_id = 12;
        theirs.save(&state).unwrap();
        assert!(ours.changed_on_disk());
        assert!(!theirs.changed_on_disk());

        ours.load();
        assert!(!ours.changed_on_disk());
        fs::remove_file(&path).unwrap();
        assert!(ours.changed_on_disk());
    }

    #[test]
    fn malformed_task_is_dropped_individually() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracker_data.json");
        fs::write(
            &path,
            r#"{
                "tasks": [
                    {"id": 1, "name": "a", "units": 2, "done": 0},
                    {"id": 2, "name": "broken", "done": 0},
                    {"id": 3, "name": "c", "units": 1, "done": 1, "archived": true}
                ],
                "time_logs": [
                    {"task_id": 1, "start": "2024-01-01T10:00:00", "duration": 60},
                    {"task_id": 1, "duration": 60}
                ],
                "reminders": "nope",
                "active_timer": 5,
                "selected_task_id": "x"
            }"#,
        )
        .unwrap();

        let loaded = StateStore::new(&path).load();
        assert_eq!(loaded.state.tasks.len(), 2);
        assert!(loaded.state.tasks[0].is_today);
        assert!(loaded.state.tasks[1].archived);
        assert_eq!(loaded.state.time_logs.len(), 1);
        assert!(loaded.state.reminders.is_empty());
        assert_eq!(loaded.state.active_timer, None);
        assert_eq!(loaded.state.selected_task_id, None);
        assert_eq!(loaded.state.next_task_id, 4);
        assert_eq!(loaded.dropped_records, 2);
        assert!(!loaded.quarantined);
    }

    #[test]
    fn unparseable_file_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracker_data.json");
        fs::write(&path, "{ not json").unwrap();

        let loaded = StateStore::new(&path).load();
        assert!(loaded.quarantined);
        assert_eq!(loaded.state, TrackerState::default());
        let moved = loaded.quarantine_path.unwrap();
        assert!(moved.exists());
        assert!(!path.exists());
        let name = moved.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("tracker_data-"));
        assert!(name.ends_with(".corrupt"));
    }

    #[test]
    fn non_object_document_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracker_data.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(StateStore::new(&path).load().quarantined);
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("out.json.tmp").exists());
    }
}
