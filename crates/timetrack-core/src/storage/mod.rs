mod config;
mod state_store;

pub use config::{Config, NotificationsConfig, RemindersConfig, StorageConfig, TimerConfig};
pub use state_store::{atomic_write, Loaded, StateStore, TrackerState};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `TIMETRACK_DATA_DIR` wins when set. Otherwise `~/.config/timetrack`, or
/// `~/.config/timetrack-dev` with `TIMETRACK_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("TIMETRACK_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("TIMETRACK_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("timetrack-dev")
            } else {
                base_dir.join("timetrack")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
