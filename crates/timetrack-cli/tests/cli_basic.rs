//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

mod common;

use common::Sandbox;

#[test]
fn test_task_add_and_list() {
    let sb = Sandbox::new();
    let out = sb.run_success(&["task", "add", "Write report", "--units", "3"]);
    assert!(out.contains("Task created: 1"));

    let tasks = sb.run_json(&["task", "list", "--json"]);
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], 1);
    assert_eq!(tasks[0]["name"], "Write report");
    assert_eq!(tasks[0]["units"], 3.0);
    assert_eq!(tasks[0]["done"], 0.0);
    assert_eq!(tasks[0]["percent"], 0.0);
}

#[test]
fn test_task_progress_clamps_at_target() {
    let sb = Sandbox::new();
    sb.run_success(&["task", "add", "Pushups", "--units", "2"]);
    for _ in 0..3 {
        sb.run_success(&["task", "inc", "1"]);
    }
    let out = sb.run_success(&["task", "list"]);
    assert!(out.contains("2/2"));
    assert!(out.contains("100%"));
    assert!(out.contains("[done]"));

    sb.run_success(&["task", "dec", "1"]);
    let out = sb.run_success(&["task", "list"]);
    assert!(out.contains("1/2"));
    assert!(out.contains(" 50%"));
}

#[test]
fn test_unknown_task_is_an_error() {
    let sb = Sandbox::new();
    let (_, stderr, code) = sb.run_failure(&["task", "inc", "99"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_blank_task_name_rejected() {
    let sb = Sandbox::new();
    sb.run_failure(&["task", "add", "   "]);
}

#[test]
fn test_ids_not_reused_after_delete() {
    let sb = Sandbox::new();
    sb.run_success(&["task", "add", "a"]);
    sb.run_success(&["task", "add", "b"]);
    sb.run_success(&["task", "delete", "2"]);
    assert!(sb.run_success(&["task", "add", "c"]).contains("Task created: 3"));
}

#[test]
fn test_timer_lifecycle() {
    let sb = Sandbox::new();
    sb.run_failure(&["timer", "start"]);

    sb.run_success(&["task", "add", "Focus"]);
    sb.run_success(&["task", "select", "1"]);
    assert!(sb.run_success(&["timer", "start"]).contains("running"));

    let status = sb.run_json(&["timer", "status", "--json"]);
    assert_eq!(status["state"], "running");
    assert_eq!(status["task_id"], 1);
    assert_eq!(status["task_name"], "Focus");

    assert!(sb.run_success(&["timer", "pause"]).contains("paused"));
    sb.run_success(&["timer", "stop"]);
    assert_eq!(sb.run_json(&["timer", "status", "--json"])["state"], "idle");

    let state: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(sb.path().join("tracker_data.json")).unwrap(),
    )
    .unwrap();
    assert!(state["active_timer"].is_null());
    assert_eq!(state["selected_task_id"], 1);
}

#[test]
fn test_reminder_add_and_list() {
    let sb = Sandbox::new();
    sb.run_success(&["reminder", "add", "Tea", "0:15"]);
    sb.run_success(&["reminder", "add", "Standup", "9:30"]);
    sb.run_failure(&["reminder", "add", "Bad", "7:75"]);

    let reminders = sb.run_json(&["reminder", "list", "--json"]);
    let reminders = reminders.as_array().unwrap();
    assert_eq!(reminders.len(), 2);
    assert_eq!(reminders[0]["is_relative"], true);
    assert_eq!(reminders[0]["time_hours"], 0.25);
    assert!(reminders[0]["next_fire_at"].is_string());
    assert_eq!(reminders[1]["is_relative"], false);

    assert!(sb.run_success(&["reminder", "toggle", "1"]).contains("disabled"));
    assert!(sb.run_success(&["reminder", "list"]).contains("off"));
    sb.run_success(&["reminder", "snooze", "2", "--minutes", "5"]);
    sb.run_success(&["reminder", "dismiss", "2"]);
    sb.run_success(&["reminder", "delete", "1"]);
    sb.run_failure(&["reminder", "delete", "1"]);
}

#[test]
fn test_config_get_set() {
    let sb = Sandbox::new();
    assert_eq!(sb.run_success(&["config", "get", "timer.idle_gap_cap_secs"]).trim(), "3600");
    sb.run_success(&["config", "set", "timer.idle_gap_cap_secs", "900"]);
    assert_eq!(sb.run_success(&["config", "get", "timer.idle_gap_cap_secs"]).trim(), "900");
    sb.run_failure(&["config", "get", "timer.nope"]);
    sb.run_failure(&["config", "set", "timer.idle_gap_cap_secs", "soon"]);

    let list = sb.run_success(&["config", "list"]);
    assert!(list.contains("notifications.desktop = false"));

    sb.run_success(&["config", "reset"]);
    assert_eq!(sb.run_success(&["config", "get", "timer.idle_gap_cap_secs"]).trim(), "3600");
}

#[test]
fn test_log_export_csv() {
    let sb = Sandbox::new();
    sb.run_success(&["task", "add", "Exported"]);
    let out = sb.run_success(&["log", "export", "--format", "csv"]);
    assert!(out.starts_with("CSV written to"));

    let csv = std::fs::read_to_string(sb.path().join("tracker_time_logs.csv")).unwrap();
    assert_eq!(csv.lines().next(), Some("task_id,task_name,start,end,duration_seconds"));

    sb.run_failure(&["log", "export", "--format", "xml"]);
}

#[test]
fn test_log_reports() {
    let sb = Sandbox::new();
    assert!(sb.run_success(&["log", "today"]).contains("Nothing logged today"));
    assert_eq!(sb.run_json(&["log", "week", "--json"]).as_array().unwrap().len(), 7);
    sb.run_success(&["log", "month", "2024-02"]);
    sb.run_failure(&["log", "month", "February"]);
}

#[test]
fn test_corrupt_state_is_quarantined() {
    let sb = Sandbox::new();
    std::fs::write(sb.path().join("tracker_data.json"), "{{{ not json").unwrap();

    assert!(sb.run_success(&["task", "list"]).contains("No tasks"));
    let quarantined = std::fs::read_dir(sb.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().ends_with(".corrupt"));
    assert!(quarantined);
}
