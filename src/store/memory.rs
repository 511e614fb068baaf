//! Process-local store implementation.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use serde_json::Value;

use crate::outbox::{EventStatus, WebhookEvent};
use crate::session::{Session, Subscriptions};
use crate::time::{Clock, SystemClock};

use super::tables::Tables;
use super::{OutboxStore, SessionStore, StoreError};

/// In-memory implementation of [`SessionStore`] and [`OutboxStore`].
///
/// Contents are lost when the process exits. Used by tests and by embedders
/// that provide durability elsewhere.
///
/// # Type Parameters
///
/// - `C`: The [`Clock`] used for row timestamps (defaults to [`SystemClock`])
#[derive(Debug, Default)]
pub struct MemoryStore<C = SystemClock> {
    tables: Mutex<Tables>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    /// Creates an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Creates an empty store with a custom clock.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Inserts or replaces a session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateSession`] if another session of the same
    /// owner already uses the name.
    pub fn insert_session(&self, session: Session) -> Result<(), StoreError> {
        self.tables().insert_session(session)
    }

    /// Removes a session, returning it if it existed.
    pub fn remove_session(&self, id: &str) -> Option<Session> {
        self.tables().remove_session(id)
    }

    /// Returns a copy of one outbox row.
    #[must_use]
    pub fn event(&self, id: i64) -> Option<WebhookEvent> {
        self.tables().event(id)
    }

    /// Returns a copy of every outbox row, ordered by id.
    #[must_use]
    pub fn events(&self) -> Vec<WebhookEvent> {
        self.tables().events()
    }
}

impl<C: Clock + 'static> SessionStore for MemoryStore<C> {
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.tables().session(id))
    }

    async fn get_by_owner_and_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self.tables().session_by_owner_and_name(owner, name))
    }

    async fn list_connected(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.tables().connected_sessions())
    }

    async fn update_connected(&self, id: &str, connected: bool) -> Result<(), StoreError> {
        self.tables().set_connected(id, connected)
    }

    async fn update_identity(&self, id: &str, identity: &str) -> Result<(), StoreError> {
        self.tables().set_identity(id, identity)
    }

    async fn update_qr_code(&self, id: &str, code: &str) -> Result<(), StoreError> {
        self.tables().set_qr_code(id, code)
    }

    async fn update_webhook_config(
        &self,
        id: &str,
        url: &str,
        events: &Subscriptions,
    ) -> Result<(), StoreError> {
        self.tables().set_webhook_config(id, url, events)
    }
}

impl<C: Clock + 'static> OutboxStore for MemoryStore<C> {
    async fn insert_pending(
        &self,
        owner: &str,
        session_id: Option<&str>,
        event_type: &str,
        payload: Value,
    ) -> Result<i64, StoreError> {
        let now = self.now();
        Ok(self
            .tables()
            .insert_event(owner, session_id, event_type, payload, now))
    }

    async fn fetch_pending_batch(&self, limit: usize) -> Result<Vec<WebhookEvent>, StoreError> {
        Ok(self.tables().pending_batch(limit))
    }

    async fn mark_sent(&self, id: i64) -> Result<(), StoreError> {
        let now = self.now();
        self.tables().mark_sent(id, now)
    }

    async fn mark_failed(&self, id: i64) -> Result<(), StoreError> {
        let now = self.now();
        self.tables().mark_failed(id, now)
    }

    async fn record_failure(&self, id: i64) -> Result<EventStatus, StoreError> {
        let now = self.now();
        self.tables().record_failure(id, now)
    }

    async fn purge_terminal_before(&self, cutoff: SystemTime) -> Result<usize, StoreError> {
        Ok(self.tables().purge_terminal_before(cutoff))
    }
}
