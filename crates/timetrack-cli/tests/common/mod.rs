//! Common utilities for CLI E2E tests.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// An isolated data directory for one test.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    /// Fresh data directory with desktop notifications turned off.
    pub fn new() -> Self {
        let sandbox = Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        };
        sandbox.run_success(&["config", "set", "notifications.desktop", "false"]);
        sandbox
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Invoke a CLI command and return (stdout, stderr, exit code).
    pub fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = Command::new(env!("CARGO_BIN_EXE_timetrack"))
            .args(args)
            .env("TIMETRACK_DATA_DIR", self.dir.path())
            .env_remove("TIMETRACK_LOG")
            .output()
            .expect("Failed to execute CLI command");

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);

        (stdout, stderr, code)
    }

    /// Invoke a CLI command and expect success.
    pub fn run_success(&self, args: &[&str]) -> String {
        let (stdout, stderr, code) = self.run(args);
        assert_eq!(code, 0, "CLI command failed with code {code}: {args:?}\n{stderr}");
        stdout
    }

    /// Invoke a CLI command and expect failure.
    pub fn run_failure(&self, args: &[&str]) -> (String, String, i32) {
        let (stdout, stderr, code) = self.run(args);
        assert!(code != 0, "CLI command unexpectedly succeeded: {args:?}");
        (stdout, stderr, code)
    }

    /// Run a command and parse its stdout as JSON.
    pub fn run_json(&self, args: &[&str]) -> serde_json::Value {
        let stdout = self.run_success(args);
        serde_json::from_str(&stdout).expect("Failed to parse JSON output")
    }
}
