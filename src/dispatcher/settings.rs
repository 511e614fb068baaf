//! Dispatcher configuration and outcome bookkeeping.

use std::time::Duration;

/// Tuning knobs for the dispatcher loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Time between two polls of the outbox.
    pub poll_interval: Duration,
    /// Maximum rows fetched per poll.
    pub batch_size: usize,
    /// Age after which terminal rows are purged. `None` keeps them forever.
    pub retention: Option<Duration>,
}

impl DispatcherSettings {
    /// Default poll cadence (2 seconds).
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

    /// Default batch size.
    pub const DEFAULT_BATCH_SIZE: usize = 50;

    /// Minimum time between two retention purges.
    pub const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

    /// Sets the poll cadence.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Enables purging of terminal rows older than `retention`.
    #[must_use]
    pub const fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            retention: None,
        }
    }
}

/// What the dispatcher did with one row.
///
/// Unsubscribed events and delivered events both end up `sent` in the
/// store; this type keeps them apart for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Endpoint accepted the payload; row is `sent`.
    Delivered,
    /// Delivery failed with attempts left; row stays `pending`.
    Retrying,
    /// Delivery failed on the last attempt; row is `failed`.
    Exhausted,
    /// Event type not subscribed; row is `sent` with no HTTP call.
    Filtered,
    /// Session missing or unresolvable; row is `failed`.
    Orphaned,
    /// Session has no webhook URL; row is `failed`.
    NoWebhook,
    /// Session lookup hit a store error; row is untouched.
    Deferred,
}

impl Outcome {
    /// Returns true if the row reached `sent` or `failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Retrying | Self::Deferred)
    }
}

/// Counts of outcomes for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Rows delivered.
    pub delivered: usize,
    /// Rows marked `sent` without delivery.
    pub filtered: usize,
    /// Rows left `pending` after a failed attempt.
    pub retrying: usize,
    /// Rows marked `failed` (exhausted, orphaned, no webhook).
    pub failed: usize,
    /// Rows skipped because the session lookup failed.
    pub deferred: usize,
    /// Rows whose status update could not be written.
    pub errors: usize,
}

impl BatchSummary {
    /// Adds one outcome to the counts.
    pub const fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Delivered => self.delivered += 1,
            Outcome::Filtered => self.filtered += 1,
            Outcome::Retrying => self.retrying += 1,
            Outcome::Exhausted | Outcome::Orphaned | Outcome::NoWebhook => self.failed += 1,
            Outcome::Deferred => self.deferred += 1,
        }
    }

    /// Total rows seen in the batch.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.delivered + self.filtered + self.retrying + self.failed + self.deferred + self.errors
    }

    /// Returns true if the batch was empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
