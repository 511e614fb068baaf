//! Default values for configuration options.

use std::time::Duration;

/// Default store file, relative to the working directory.
pub const STORE_PATH: &str = "chat-relay.json";

/// Default dispatcher poll interval in seconds.
pub const POLL_INTERVAL_SECS: u64 = 2;

/// Default number of rows fetched per poll.
pub const BATCH_SIZE: usize = 50;

/// Default per-attempt webhook timeout in seconds.
pub const SEND_TIMEOUT_SECS: u64 = 10;

/// Default `User-Agent` for webhook requests.
pub const USER_AGENT: &str = "chat-relay-webhook/1.0";

/// Default retention for terminal rows in hours (one week).
///
/// Configuring 0 keeps terminal rows forever.
pub const RETENTION_HOURS: u64 = 168;

/// Default delay before reconnecting persisted sessions, in seconds.
pub const RECONNECT_DELAY_SECS: u64 = 2;

/// Default capacity of the event queue.
pub const EVENT_QUEUE: usize = 1024;

/// Default poll interval as Duration.
#[must_use]
pub const fn poll_interval() -> Duration {
    Duration::from_secs(POLL_INTERVAL_SECS)
}

/// Default send timeout as Duration.
#[must_use]
pub const fn send_timeout() -> Duration {
    Duration::from_secs(SEND_TIMEOUT_SECS)
}

/// Default reconnect delay as Duration.
#[must_use]
pub const fn reconnect_delay() -> Duration {
    Duration::from_secs(RECONNECT_DELAY_SECS)
}
