//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use http::HeaderValue;

use crate::dispatcher::DispatcherSettings;
use crate::relay::RelaySettings;

use super::cli::Cli;
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::TomlConfig;

/// Seconds in one hour.
const SECS_PER_HOUR: u64 = 3600;

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// Store file path, tilde-expanded
    pub store_path: PathBuf,

    /// Dispatcher poll interval
    pub poll_interval: Duration,

    /// Rows per poll
    pub batch_size: usize,

    /// Per-attempt webhook timeout
    pub send_timeout: Duration,

    /// `User-Agent` for webhook requests
    pub user_agent: HeaderValue,

    /// Age after which terminal rows are purged; `None` keeps them
    pub retention: Option<Duration>,

    /// Delay before reconnecting persisted sessions
    pub reconnect_delay: Duration,

    /// Event queue capacity
    pub event_queue: usize,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let retention = self
            .retention
            .map_or_else(|| "off".to_string(), |d| format!("{}h", d.as_secs() / SECS_PER_HOUR));

        write!(
            f,
            "Config {{ store: {}, poll_interval: {}s, batch_size: {}, send_timeout: {}s, \
             user_agent: {}, retention: {} }}",
            self.store_path.display(),
            self.poll_interval.as_secs(),
            self.batch_size,
            self.send_timeout.as_secs(),
            self.user_agent.to_str().unwrap_or("<binary>"),
            retention,
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A duration or count is zero
    /// - The user agent is not a valid header value
    /// - The store path starts with `~` and no home directory is known
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let dispatcher = toml.map(|t| &t.dispatcher);
        let registry = toml.map(|t| &t.registry);

        let store_path = Self::resolve_store_path(cli, toml)?;

        let poll_interval = positive_secs(
            field::POLL_INTERVAL,
            cli.poll_interval
                .or_else(|| dispatcher.and_then(|d| d.poll_interval))
                .unwrap_or(defaults::POLL_INTERVAL_SECS),
        )?;

        let batch_size = positive_count(
            field::BATCH_SIZE,
            cli.batch_size
                .or_else(|| dispatcher.and_then(|d| d.batch_size))
                .unwrap_or(defaults::BATCH_SIZE),
        )?;

        let send_timeout = positive_secs(
            field::SEND_TIMEOUT,
            cli.send_timeout
                .or_else(|| dispatcher.and_then(|d| d.send_timeout))
                .unwrap_or(defaults::SEND_TIMEOUT_SECS),
        )?;

        let user_agent = Self::resolve_user_agent(cli, toml)?;
        let retention = Self::resolve_retention(cli, toml)?;

        // Registry settings are TOML-only
        let reconnect_delay = registry
            .and_then(|r| r.reconnect_delay)
            .map_or_else(defaults::reconnect_delay, Duration::from_secs);

        let event_queue = positive_count(
            field::EVENT_QUEUE,
            registry
                .and_then(|r| r.event_queue)
                .unwrap_or(defaults::EVENT_QUEUE),
        )?;

        Ok(Self {
            store_path,
            poll_interval,
            batch_size,
            send_timeout,
            user_agent,
            retention,
            reconnect_delay,
            event_queue,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    /// Dispatcher loop settings.
    #[must_use]
    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings::default()
            .with_poll_interval(self.poll_interval)
            .with_batch_size(self.batch_size)
            .with_retention(self.retention)
    }

    /// Settings for an embedded relay.
    #[must_use]
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            dispatcher: self.dispatcher_settings(),
            event_queue: self.event_queue,
            reconnect_delay: self.reconnect_delay,
        }
    }

    fn resolve_store_path(cli: &Cli, toml: Option<&TomlConfig>) -> Result<PathBuf, ConfigError> {
        // CLI takes precedence
        if let Some(ref path) = cli.store {
            return Ok(path.clone());
        }

        let raw = toml
            .and_then(|t| t.store.path.as_deref())
            .unwrap_or(defaults::STORE_PATH);

        expand_tilde(raw)
    }

    fn resolve_user_agent(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<HeaderValue, ConfigError> {
        let value = cli
            .user_agent
            .as_deref()
            .or_else(|| toml.and_then(|t| t.dispatcher.user_agent.as_deref()))
            .unwrap_or(defaults::USER_AGENT);

        HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidUserAgent {
            value: value.to_string(),
            reason: e.to_string(),
        })
    }

    fn resolve_retention(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Option<Duration>, ConfigError> {
        let hours = cli
            .retention_hours
            .or_else(|| toml.and_then(|t| t.dispatcher.retention_hours))
            .unwrap_or(defaults::RETENTION_HOURS);

        if hours == 0 {
            return Ok(None);
        }

        hours
            .checked_mul(SECS_PER_HOUR)
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or_else(|| ConfigError::InvalidDuration {
                field: field::RETENTION_HOURS,
                reason: "too large".to_string(),
            })
    }
}

/// Expands a leading `~` or `~/` to the home directory.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPath`] if the path needs the home directory
/// and none can be determined.
pub fn expand_tilde(path: &str) -> Result<PathBuf, ConfigError> {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => &rest[1..],
        _ => return Ok(PathBuf::from(path)),
    };

    let home = dirs::home_dir().ok_or_else(|| ConfigError::InvalidPath {
        path: path.to_string(),
        reason: "home directory not found",
    })?;

    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

fn positive_secs(field: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::zero_duration(field));
    }
    Ok(Duration::from_secs(secs))
}

fn positive_count(field: &'static str, count: usize) -> Result<usize, ConfigError> {
    if count == 0 {
        return Err(ConfigError::zero_value(field));
    }
    Ok(count)
}
