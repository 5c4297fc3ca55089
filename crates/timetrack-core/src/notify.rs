//! Notification delivery.
//!
//! The engine only needs `notify(title, body)`. Delivery is best-effort:
//! a sink never reports failure back to the caller.

use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::storage::NotificationsConfig;

/// Somewhere to show a short message to the user.
pub trait NotificationSink: Send {
    fn notify(&self, title: &str, body: &str);
}

/// Spawns `notify-send` detached with its output discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

impl NotificationSink for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) {
        let spawned = Command::new("notify-send")
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = spawned {
            debug!("notify-send unavailable: {e}");
        }
        info!(title, body, "notification");
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!(title, body, "notification");
    }
}

/// Swallows everything. Used when notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn notify(&self, _title: &str, _body: &str) {}
}

/// Keeps every notification in memory. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(title, body)` pairs in delivery order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|(t, _)| t).collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((title.to_string(), body.to_string()));
    }
}

/// Pick the sink named by the `[notifications]` section.
pub fn sink_for(config: &NotificationsConfig) -> Box<dyn NotificationSink> {
    match (config.enabled, config.desktop) {
        (false, _) => Box::new(NullNotifier),
        (true, true) => Box::new(DesktopNotifier),
        (true, false) => Box::new(LogNotifier),
    }
}
