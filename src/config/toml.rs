//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Store configuration section
    #[serde(default)]
    pub store: StoreSection,

    /// Dispatcher configuration section
    #[serde(default)]
    pub dispatcher: DispatcherSection,

    /// Connection registry configuration section
    #[serde(default)]
    pub registry: RegistrySection,
}

/// Store configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Path to the JSON store file; a leading `~` is expanded
    pub path: Option<String>,
}

/// Dispatcher configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherSection {
    /// Poll interval in seconds
    pub poll_interval: Option<u64>,

    /// Maximum rows per poll
    pub batch_size: Option<usize>,

    /// Per-attempt webhook timeout in seconds
    pub send_timeout: Option<u64>,

    /// User-Agent header for webhook requests
    pub user_agent: Option<String>,

    /// Purge terminal rows older than this many hours (0 = keep)
    pub retention_hours: Option<u64>,
}

/// Connection registry configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    /// Delay before reconnecting persisted sessions, in seconds
    pub reconnect_delay: Option<u64>,

    /// Capacity of the event queue between clients and the router
    pub event_queue: Option<usize>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# chat-relay configuration file

[store]
# JSON file holding sessions and the webhook outbox (default: chat-relay.json)
# A leading ~ is expanded to the home directory.
path = "chat-relay.json"

[dispatcher]
# Seconds between two polls of the outbox (default: 2)
poll_interval = 2

# Maximum rows processed per poll (default: 50)
# batch_size = 50

# Per-attempt webhook timeout in seconds (default: 10)
# send_timeout = 10

# User-Agent header for webhook requests
# user_agent = "chat-relay-webhook/1.0"

# Purge sent/failed rows older than this many hours (default: 168)
# 0 keeps them forever, and the store file then grows without bound.
# retention_hours = 168

[registry]
# Only used when chat-relay is embedded as a library with a protocol client
# factory (Relay::start). The standalone dispatcher ignores this section.

# Seconds to wait after startup before reconnecting sessions (default: 2)
# reconnect_delay = 2

# Capacity of the event queue between protocol clients and the router (default: 1024)
# event_queue = 1024
"#
    .to_string()
}
