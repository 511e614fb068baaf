//! The outbox row and its state machine.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of delivery attempts per event.
pub const MAX_ATTEMPTS: u32 = 3;

/// Delivery status of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Waiting for (another) delivery attempt.
    Pending,
    /// Delivered, or intentionally dropped because the session does not subscribe to it.
    Sent,
    /// Permanently undeliverable.
    Failed,
}

impl EventStatus {
    /// Returns true for `sent` and `failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    /// Returns the stored name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// Monotonically assigned row id.
    pub id: i64,
    /// Tenant the event belongs to.
    pub owner: String,
    /// Session the event belongs to; `None` for owner-level events.
    pub session_id: Option<String>,
    /// Event type name, matched against session subscriptions.
    pub event_type: String,
    /// Opaque event data, delivered as the webhook `data` field.
    pub payload: Value,
    /// Current delivery status.
    pub status: EventStatus,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// Time of the last status change made by the dispatcher.
    pub last_attempt_at: Option<SystemTime>,
    /// Insertion time.
    pub created_at: SystemTime,
}

impl WebhookEvent {
    /// Creates a new `pending` row with zero attempts.
    #[must_use]
    pub fn pending(
        id: i64,
        owner: impl Into<String>,
        session_id: Option<String>,
        event_type: impl Into<String>,
        payload: Value,
        created_at: SystemTime,
    ) -> Self {
        Self {
            id,
            owner: owner.into(),
            session_id,
            event_type: event_type.into(),
            payload,
            status: EventStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
            created_at,
        }
    }

    /// Returns the session reference, treating an empty id as absent.
    #[must_use]
    pub fn session_ref(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Returns true if the dispatcher should still pick this row up.
    #[must_use]
    pub const fn is_due(&self) -> bool {
        matches!(self.status, EventStatus::Pending) && self.attempts < MAX_ATTEMPTS
    }

    /// Marks the row delivered.
    pub fn mark_sent(&mut self, now: SystemTime) {
        if self.status.is_terminal() {
            return;
        }
        self.status = EventStatus::Sent;
        self.last_attempt_at = Some(now);
    }

    /// Fails the row without consuming an attempt.
    pub fn mark_failed(&mut self, now: SystemTime) {
        if self.status.is_terminal() {
            return;
        }
        self.status = EventStatus::Failed;
        self.last_attempt_at = Some(now);
    }

    /// Records one failed delivery attempt and returns the resulting status.
    ///
    /// The row becomes `failed` once `attempts` reaches [`MAX_ATTEMPTS`].
    pub fn record_failure(&mut self, now: SystemTime) -> EventStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        self.attempts = (self.attempts + 1).min(MAX_ATTEMPTS);
        self.last_attempt_at = Some(now);
        if self.attempts >= MAX_ATTEMPTS {
            self.status = EventStatus::Failed;
        }
        self.status
    }
}
