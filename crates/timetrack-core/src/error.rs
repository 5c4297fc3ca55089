//! Core error types for timetrack-core.
//!
//! Nothing in the engine surfaces a fatal error: persistence failures are
//! logged and the in-memory state stays authoritative, bad loaded records are
//! dropped, and clock anomalies are clamped. The types here describe what
//! went wrong so callers (the CLI, tests) can report it.

use std::path::PathBuf;
use thiserror::Error;

/// State file persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read the state file
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write, flush or rename the state file
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State could not be serialized
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// File exists but is not a readable state document
    #[error("State file {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Empty or whitespace-only name
    #[error("{entity} name must not be empty")]
    EmptyName { entity: &'static str },

    /// Referenced id does not exist
    #[error("No {entity} with id {id}")]
    UnknownId { entity: &'static str, id: u64 },

    /// No task given and none selected
    #[error("No task selected")]
    NoTaskSelected,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
