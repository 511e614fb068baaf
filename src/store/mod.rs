//! Persistence seams for sessions and the webhook outbox.
//!
//! The relay consumes two stores:
//! - [`SessionStore`]: session identity, connection projections, webhook config
//! - [`OutboxStore`]: pending/sent/failed webhook rows
//!
//! Both are implemented by [`MemoryStore`] (process-local) and [`FileStore`]
//! (JSON snapshot with atomic writes). Implementations serialize their own
//! row-level writes; callers may share them freely across tasks.

mod file;
mod memory;
mod tables;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::future::Future;
use std::io;
use std::time::SystemTime;

use serde_json::Value;
use thiserror::Error;

use crate::outbox::{EventStatus, WebhookEvent};
use crate::session::{Session, Subscriptions};

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No session with the given id exists.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A session with the same owner and name already exists.
    #[error("Session '{name}' already exists for owner '{owner}'")]
    DuplicateSession {
        /// Owner of the conflicting session
        owner: String,
        /// Conflicting name
        name: String,
    },

    /// No outbox row with the given id exists.
    #[error("Webhook event not found: {0}")]
    EventNotFound(i64),

    /// Failed to write the backing file.
    #[error("Failed to write store file: {0}")]
    Write(#[source] io::Error),

    /// Failed to serialize the store snapshot.
    #[error("Failed to serialize store: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The backing file exists but cannot be used.
    #[error("Store file '{}' is corrupted: {reason}", path.display())]
    Corrupted {
        /// Path to the store file
        path: std::path::PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The backend is unavailable (connection lost, worker crashed).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Session persistence consumed by the registry, router, and dispatcher.
pub trait SessionStore: Send + Sync + 'static {
    /// Looks up a session by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure; a missing session is `Ok(None)`.
    fn get_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Looks up a session by owner and name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure; a missing session is `Ok(None)`.
    fn get_by_owner_and_name(
        &self,
        owner: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Lists sessions persisted with `connected = true`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn list_connected(&self) -> impl Future<Output = Result<Vec<Session>, StoreError>> + Send;

    /// Sets the connected flag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionNotFound`] if the session does not exist.
    fn update_connected(
        &self,
        id: &str,
        connected: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Sets the protocol identity (empty string clears it).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionNotFound`] if the session does not exist.
    fn update_identity(
        &self,
        id: &str,
        identity: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stores the latest pairing code.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionNotFound`] if the session does not exist.
    fn update_qr_code(
        &self,
        id: &str,
        code: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replaces the webhook URL and subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionNotFound`] if the session does not exist.
    fn update_webhook_config(
        &self,
        id: &str,
        url: &str,
        events: &Subscriptions,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Outbox persistence consumed by the router and the dispatcher.
///
/// The `mark_*` operations never modify terminal rows.
pub trait OutboxStore: Send + Sync + 'static {
    /// Inserts a new `pending` row with zero attempts and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn insert_pending(
        &self,
        owner: &str,
        session_id: Option<&str>,
        event_type: &str,
        payload: Value,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Fetches up to `limit` rows with `status = pending AND attempts < cap`,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn fetch_pending_batch(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<WebhookEvent>, StoreError>> + Send;

    /// Marks a row `sent`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EventNotFound`] if the row does not exist.
    fn mark_sent(&self, id: i64) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Marks a row `failed` without consuming an attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EventNotFound`] if the row does not exist.
    fn mark_failed(&self, id: i64) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Increments `attempts`; the row becomes `failed` when the cap is reached.
    ///
    /// Returns the row's status after the update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EventNotFound`] if the row does not exist.
    fn record_failure(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<EventStatus, StoreError>> + Send;

    /// Deletes terminal rows created before `cutoff`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure.
    fn purge_terminal_before(
        &self,
        cutoff: SystemTime,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}
