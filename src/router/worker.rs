//! Consumer side of the event queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::outbox::Outbox;
use crate::protocol::ProtocolEvent;
use crate::session::SessionKey;
use crate::store::{OutboxStore, SessionStore, StoreError};

use super::projection::Projection;
use super::sink::{EventBus, RoutedEvent};

/// Writes protocol events into the outbox and the session projection.
///
/// # Type Parameters
///
/// * `S` - The [`SessionStore`] receiving projection updates
/// * `O` - The [`OutboxStore`] receiving webhook rows
pub struct EventRouter<S, O> {
    sessions: Arc<S>,
    outbox: Option<Outbox<O>>,
}

impl<S, O> EventRouter<S, O>
where
    S: SessionStore,
    O: OutboxStore,
{
    /// Creates a router. Without an outbox, events only update sessions.
    #[must_use]
    pub const fn new(sessions: Arc<S>, outbox: Option<Outbox<O>>) -> Self {
        Self { sessions, outbox }
    }

    /// Handles one event from the session identified by `key`.
    ///
    /// Store failures are logged; neither effect is retried.
    pub async fn route(&self, key: &SessionKey, event: ProtocolEvent) {
        tokio::join!(self.record(key, &event), self.project(key, &event));
    }

    async fn record(&self, key: &SessionKey, event: &ProtocolEvent) {
        let Some(outbox) = &self.outbox else {
            return;
        };
        let kind = event.kind();

        match outbox
            .enqueue_for_session(&key.owner, &key.session_id, kind.as_str(), event.payload())
            .await
        {
            Ok(id) => tracing::debug!(
                event_id = id,
                owner = %key.owner,
                session_id = %key.session_id,
                event_type = %kind,
                "Event enqueued"
            ),
            Err(e) => tracing::error!(
                owner = %key.owner,
                session_id = %key.session_id,
                event_type = %kind,
                "Failed to enqueue event: {e}"
            ),
        }
    }

    async fn project(&self, key: &SessionKey, event: &ProtocolEvent) {
        let Some(projection) = Projection::of(event) else {
            return;
        };

        if let Err(e) = self.apply(&key.session_id, &projection).await {
            tracing::error!(
                owner = %key.owner,
                session_id = %key.session_id,
                event_type = %event.kind(),
                "Failed to update session: {e}"
            );
        }
    }

    async fn apply(&self, id: &str, projection: &Projection<'_>) -> Result<(), StoreError> {
        match *projection {
            Projection::Online { identity } => {
                self.sessions.update_connected(id, true).await?;
                if identity.is_empty() {
                    return Ok(());
                }
                self.sessions.update_identity(id, identity).await
            }
            Projection::Offline => self.sessions.update_connected(id, false).await,
            Projection::PairingCode(code) => self.sessions.update_qr_code(id, code).await,
        }
    }

    /// Starts the worker with a queue of `capacity` events.
    ///
    /// The worker exits once the returned bus and every sink minted from it
    /// are dropped.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn spawn(self, capacity: usize) -> (EventBus, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(self.run(ReceiverStream::new(rx)));
        (EventBus::new(tx), task)
    }

    async fn run(self, mut events: ReceiverStream<RoutedEvent>) {
        while let Some(RoutedEvent { key, event }) = events.next().await {
            self.route(&key, event).await;
        }
        tracing::debug!("Event router stopped");
    }
}
