//! Snapshots returned by registry operations.

use serde::Serialize;

use crate::session::Subscriptions;

/// Result of a successful connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectInfo {
    /// Session name.
    pub name: String,
    /// Configured webhook endpoint (may be empty).
    pub webhook_url: String,
    /// Protocol identity, empty until paired.
    pub identity: String,
    /// Subscribed event types.
    pub events: Subscriptions,
}

/// Live view of one session.
///
/// `connected` and `logged_in` come from the live client and are false when
/// there is none; the rest comes from the session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// Session identifier.
    pub id: String,
    /// Session name.
    pub name: String,
    /// Transport connected.
    pub connected: bool,
    /// Device paired and authenticated.
    pub logged_in: bool,
    /// Protocol identity.
    pub identity: String,
    /// Configured webhook endpoint.
    pub webhook_url: String,
    /// Subscribed event types.
    pub events: Subscriptions,
}

/// Totals of one [`reconnect_all`](super::ConnectionRegistry::reconnect_all) run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectSummary {
    /// Sessions reconnected.
    pub connected: usize,
    /// Sessions that already had a connected client.
    pub already_connected: usize,
    /// Sessions whose reconnect failed; their `connected` flag was cleared.
    pub failed: usize,
}

impl ReconnectSummary {
    /// Sessions attempted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.connected + self.already_connected + self.failed
    }
}
