//! Session records and webhook subscriptions.
//!
//! A [`Session`] is one chat identity slot owned by a tenant. Its connection
//! fields (`connected`, `identity`, `qr_code`) are projections maintained by
//! the connection registry and the event router; request handlers only touch
//! them on explicit disconnect or logout.

mod subscriptions;


pub use subscriptions::Subscriptions;

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// Tenant that owns the session.
    pub owner: String,
    /// Human-readable name, unique per owner.
    pub name: String,
    /// Whether a live client was connected when last observed.
    #[serde(default)]
    pub connected: bool,
    /// Protocol identity; empty until the first successful login.
    #[serde(default)]
    pub identity: String,
    /// Latest pairing code; empty when none has been issued.
    #[serde(default)]
    pub qr_code: String,
    /// Webhook endpoint; empty disables delivery.
    #[serde(default)]
    pub webhook_url: String,
    /// Event types forwarded to the webhook.
    #[serde(default)]
    pub events: Subscriptions,
    /// Creation time.
    pub created_at: SystemTime,
}

impl Session {
    /// Creates a new disconnected session with a fresh time-ordered id.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            owner: owner.into(),
            name: name.into(),
            connected: false,
            identity: String::new(),
            qr_code: String::new(),
            webhook_url: String::new(),
            events: Subscriptions::default(),
            created_at: SystemTime::now(),
        }
    }

    /// Sets the webhook endpoint and subscribed events.
    #[must_use]
    pub fn with_webhook(mut self, url: impl Into<String>, events: Subscriptions) -> Self {
        self.webhook_url = url.into();
        self.events = events;
        self
    }

    /// Returns the registry key of this session under its own owner.
    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.owner, &self.id)
    }

    /// Returns true if a webhook endpoint is configured.
    #[must_use]
    pub const fn has_webhook(&self) -> bool {
        !self.webhook_url.is_empty()
    }
}

/// Registry key: one live client per `(owner, session)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    /// Tenant.
    pub owner: String,
    /// Session identifier.
    pub session_id: String,
}

impl SessionKey {
    /// Creates a key from owner and session id.
    #[must_use]
    pub fn new(owner: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.session_id)
    }
}
