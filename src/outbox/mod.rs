//! Webhook outbox records and the enqueue façade.
//!
//! Every protocol event is persisted as a [`WebhookEvent`] before any delivery
//! is attempted. Rows start `pending` and end in exactly one terminal state:
//!
//! ```text
//! pending --delivered--------------------> sent
//! pending --failed, attempts < cap-------> pending (attempts + 1)
//! pending --failed, attempts == cap------> failed
//! pending --orphaned / no webhook--------> failed
//! pending --event type not subscribed----> sent
//! ```
//!
//! Terminal rows are never touched again; the transition methods below are
//! no-ops on them.

mod event;


pub use event::{EventStatus, MAX_ATTEMPTS, WebhookEvent};

use std::sync::Arc;

use serde_json::Value;

use crate::store::{OutboxStore, StoreError};

/// Entry point for inserting webhook events.
///
/// Each call inserts exactly one new `pending` row; there is no
/// de-duplication.
#[derive(Debug)]
pub struct Outbox<O> {
    store: Arc<O>,
}

impl<O> Clone for Outbox<O> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<O: OutboxStore> Outbox<O> {
    /// Creates a façade over the given outbox store.
    #[must_use]
    pub const fn new(store: Arc<O>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<O> {
        &self.store
    }

    /// Enqueues an owner-level event not tied to any session.
    ///
    /// Such rows can never be delivered and are failed on the next poll.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the row cannot be inserted.
    pub async fn enqueue(
        &self,
        owner: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<i64, StoreError> {
        self.store
            .insert_pending(owner, None, event_type, payload)
            .await
    }

    /// Enqueues an event for a specific session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the row cannot be inserted.
    pub async fn enqueue_for_session(
        &self,
        owner: &str,
        session_id: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<i64, StoreError> {
        self.store
            .insert_pending(owner, Some(session_id), event_type, payload)
            .await
    }
}
