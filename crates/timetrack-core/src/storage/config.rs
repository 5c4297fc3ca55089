//! TOML-based application configuration.
//!
//! Stores:
//! - Where the state file and exports live
//! - Timer tunables (tick cadence, idle-gap cap, session clamp)
//! - Reminder defaults
//! - Notification preferences
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::data_dir;
use crate::clock::secs_to_duration;
use crate::error::ConfigError;
use crate::reminder::MAX_SNOOZE_MINUTES;
use crate::timer::{TimerSettings, IDLE_GAP_CAP_SECS, MAX_SESSION_SECS};

const MAX_TICK_INTERVAL_SECS: u64 = 60;
const MAX_HEARTBEAT_SECS: u64 = 24 * 3600;
/// Upper bound for the session clamp and the idle-gap cap.
const MAX_DURATION_SECS: u64 = 7 * 24 * 3600;

/// File locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// State file name or path, relative to the data directory.
    #[serde(default = "default_state_file")]
    pub state_file: String,
    /// Directory for exports. Defaults to the state file's directory.
    #[serde(default)]
    pub export_dir: Option<String>,
}

/// Timer tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_idle_gap_cap_secs")]
    pub idle_gap_cap_secs: u64,
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: u64,
    #[serde(default = "default_min_logged_secs")]
    pub min_logged_secs: u64,
    /// How often a running timer's heartbeat is written to disk.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

/// Reminder defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_snooze_minutes")]
    pub default_snooze_minutes: u64,
    /// Relative reminders re-arm after firing instead of disabling.
    #[serde(default = "default_true")]
    pub relative_repeat: bool,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Use the desktop notifier; otherwise notifications only go to the log.
    #[serde(default = "default_true")]
    pub desktop: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_state_file() -> String {
    "tracker_data.json".into()
}
fn default_tick_interval_secs() -> u64 {
    1
}
fn default_idle_gap_cap_secs() -> u64 {
    IDLE_GAP_CAP_SECS as u64
}
fn default_max_session_secs() -> u64 {
    MAX_SESSION_SECS as u64
}
fn default_min_logged_secs() -> u64 {
    1
}
fn default_heartbeat_secs() -> u64 {
    60
}
fn default_snooze_minutes() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            export_dir: None,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            idle_gap_cap_secs: default_idle_gap_cap_secs(),
            max_session_secs: default_max_session_secs(),
            min_logged_secs: default_min_logged_secs(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            default_snooze_minutes: default_snooze_minutes(),
            relative_repeat: true,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            desktop: true,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("expected true or false, got '{value}'")))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("expected a whole number, got '{value}'")))?,
                    serde_json::Value::Object(_) => return Err(unknown()),
                    // Unset optional strings are null in the JSON view.
                    serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default config file location.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file does not exist.
    ///
    /// Out-of-range tunables in the file are replaced by their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Self>(&content)
                .map(Self::repaired)
                .map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// as the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf key with its current value, in file order.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                serde_json::Value::Null => out.push((prefix.to_string(), String::new())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let timer = &self.timer;

        let bounded = [
            ("timer.tick_interval_secs", timer.tick_interval_secs, 1, MAX_TICK_INTERVAL_SECS),
            ("timer.heartbeat_secs", timer.heartbeat_secs, 1, MAX_HEARTBEAT_SECS),
            ("timer.max_session_secs", timer.max_session_secs, 1, MAX_DURATION_SECS),
            ("timer.idle_gap_cap_secs", timer.idle_gap_cap_secs, 1, MAX_DURATION_SECS),
            ("reminders.default_snooze_minutes", self.reminders.default_snooze_minutes, 0, MAX_SNOOZE_MINUTES),
        ];
        for (key, value, min, max) in bounded {
            if !(min..=max).contains(&value) {
                return Err(invalid(key, format!("must be between {min} and {max}, got {value}")));
            }
        }
        if timer.idle_gap_cap_secs <= timer.tick_interval_secs {
            return Err(invalid(
                "timer.idle_gap_cap_secs",
                format!(
                    "must be greater than timer.tick_interval_secs ({})",
                    timer.tick_interval_secs
                ),
            ));
        }
        if timer.min_logged_secs >= timer.max_session_secs {
            return Err(invalid(
                "timer.min_logged_secs",
                format!(
                    "must be less than timer.max_session_secs ({})",
                    timer.max_session_secs
                ),
            ));
        }
        if self.storage.state_file.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.state_file".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Replace whatever fails validation with defaults.
    fn repaired(mut self) -> Self {
        if let Err(e) = self.validate() {
            warn!("{e}; using default timer and reminder settings");
            self.timer = TimerConfig::default();
            self.reminders.default_snooze_minutes = default_snooze_minutes();
            if self.storage.state_file.trim().is_empty() {
                self.storage.state_file = default_state_file();
            }
        }
        self
    }

    /// Engine tunables derived from the `[timer]` section.
    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            tick_interval: secs_to_duration(self.timer.tick_interval_secs.max(1) as f64),
            idle_gap_cap_secs: self.timer.idle_gap_cap_secs as f64,
            max_session_secs: self.timer.max_session_secs.max(1) as f64,
            min_logged_secs: self.timer.min_logged_secs as f64,
        }
    }

    /// Resolve the state file against `data_dir`; absolute paths are kept.
    pub fn state_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.storage.state_file)
    }

    /// Directory exports go to when no explicit path is given.
    pub fn export_dir(&self, data_dir: &Path) -> PathBuf {
        match &self.storage.export_dir {
            Some(dir) if !dir.is_empty() => data_dir.join(dir),
            _ => self
                .state_path(data_dir)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| data_dir.to_path_buf()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let parsed: Config = toml::from_str("[timer]\nidle_gap_cap_secs = 120\n").unwrap();
        assert_eq!(parsed.timer.idle_gap_cap_secs, 120);
        assert_eq!(parsed.timer.tick_interval_secs, 1);
        assert_eq!(parsed.storage.state_file, "tracker_data.json");
        assert!(parsed.reminders.relative_repeat);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.max_session_secs").as_deref(), Some("57600"));
        assert_eq!(cfg.get("notifications.enabled").as_deref(), Some("true"));
        assert_eq!(
            cfg.get("storage.state_file").as_deref(),
            Some("tracker_data.json")
        );
        assert_eq!(cfg.get("storage.export_dir").as_deref(), Some(""));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("timer.idle_gap_cap_secs", "600").unwrap();
        cfg.set("reminders.relative_repeat", "false").unwrap();
        cfg.set("storage.export_dir", "exports").unwrap();
        assert_eq!(cfg.timer.idle_gap_cap_secs, 600);
        assert!(!cfg.reminders.relative_repeat);
        assert_eq!(cfg.storage.export_dir.as_deref(), Some("exports"));
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("timer", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            cfg.set("notifications.enabled", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("timer.tick_interval_secs", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_rejects_unsafe_timer_values() {
        let mut cfg = Config::default();
        for (key, value) in [
            ("timer.idle_gap_cap_secs", "0"),
            ("timer.idle_gap_cap_secs", "1"),
            ("timer.idle_gap_cap_secs", "99999999999"),
            ("timer.tick_interval_secs", "1000000"),
            ("timer.heartbeat_secs", "18446744073709551615"),
            ("timer.max_session_secs", "99999999999"),
            ("timer.min_logged_secs", "57600"),
            ("reminders.default_snooze_minutes", "1000000000000"),
        ] {
            assert!(
                matches!(cfg.set(key, value), Err(ConfigError::InvalidValue { .. })),
                "{key} = {value} should be rejected"
            );
        }
        assert_eq!(cfg, Config::default());

        cfg.set("timer.idle_gap_cap_secs", "2").unwrap();
        cfg.set("timer.heartbeat_secs", "3600").unwrap();
        assert_eq!(cfg.timer.idle_gap_cap_secs, 2);
    }

    #[test]
    fn out_of_range_file_values_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[timer]\nidle_gap_cap_secs = 0\n\n[notifications]\ndesktop = false\n",
        )
        .unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.timer, TimerConfig::default());
        assert!(!cfg.notifications.desktop);
    }

    #[test]
    fn load_from_writes_defaults_on_first_use() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut cfg = cfg;
        cfg.set("reminders.default_snooze_minutes", "5").unwrap();
        cfg.save_to(&path).unwrap();
        assert_eq!(
            Config::load_from(&path).unwrap().reminders.default_snooze_minutes,
            5
        );
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timer = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn entries_lists_every_leaf() {
        let keys: Vec<String> = Config::default().entries().into_iter().map(|(k, _)| k).collect();
        assert!(keys.contains(&"timer.heartbeat_secs".to_string()));
        assert!(keys.contains(&"notifications.desktop".to_string()));
        assert!(keys.contains(&"storage.export_dir".to_string()));
    }

    #[test]
    fn derived_paths_and_settings() {
        let mut cfg = Config::default();
        let base = Path::new("/data");
        assert_eq!(cfg.state_path(base), PathBuf::from("/data/tracker_data.json"));
        assert_eq!(cfg.export_dir(base), PathBuf::from("/data"));
        cfg.storage.export_dir = Some("out".into());
        assert_eq!(cfg.export_dir(base), PathBuf::from("/data/out"));

        let settings = cfg.timer_settings();
        assert_eq!(settings.idle_gap_cap_secs, 3600.0);
        assert_eq!(settings.tick_interval, chrono::Duration::seconds(1));
    }
}
