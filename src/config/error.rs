//! Error types for configuration parsing and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration operations.
///
/// Covers errors from parsing, validation, and file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to write configuration file (for init command).
    #[error("Failed to write config file '{}': {source}", path.display())]
    FileWrite {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid duration value (zero or too large).
    #[error("Invalid duration for {field}: {reason}")]
    InvalidDuration {
        /// Name of the field
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid count or capacity.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the field
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// User agent is not a valid header value.
    #[error("Invalid user agent '{value}': {reason}")]
    InvalidUserAgent {
        /// The rejected value
        value: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Store path cannot be resolved.
    #[error("Invalid store path '{path}': {reason}")]
    InvalidPath {
        /// The path as given
        path: String,
        /// Reason for invalidity
        reason: &'static str,
    },
}

/// Well-known field names for validation errors.
pub mod field {
    /// Dispatcher poll interval.
    pub const POLL_INTERVAL: &str = "poll_interval";
    /// Dispatcher batch size.
    pub const BATCH_SIZE: &str = "batch_size";
    /// Webhook send timeout.
    pub const SEND_TIMEOUT: &str = "send_timeout";
    /// Terminal row retention.
    pub const RETENTION_HOURS: &str = "retention_hours";
    /// Event queue capacity.
    pub const EVENT_QUEUE: &str = "event_queue";
}

impl ConfigError {
    /// Creates an `InvalidDuration` error for a zero value.
    #[must_use]
    pub fn zero_duration(field: &'static str) -> Self {
        Self::InvalidDuration {
            field,
            reason: "must be greater than 0".to_string(),
        }
    }

    /// Creates an `InvalidValue` error for a zero value.
    #[must_use]
    pub fn zero_value(field: &'static str) -> Self {
        Self::InvalidValue {
            field,
            reason: "must be greater than 0".to_string(),
        }
    }
}
