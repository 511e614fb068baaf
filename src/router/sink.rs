//! Producer side of the event queue.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::protocol::ProtocolEvent;
use crate::session::SessionKey;

/// An event tagged with the session that produced it.
#[derive(Debug)]
pub(super) struct RoutedEvent {
    pub(super) key: SessionKey,
    pub(super) event: ProtocolEvent,
}

/// Handle to a running router's queue, used to mint per-session sinks.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::Sender<RoutedEvent>,
}

impl EventBus {
    pub(super) const fn new(tx: mpsc::Sender<RoutedEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink that tags every event with `key`.
    #[must_use]
    pub fn sink(&self, key: SessionKey) -> EventSink {
        EventSink {
            key,
            tx: self.tx.clone(),
        }
    }

    /// Returns true if the router worker has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Callback target handed to a protocol client.
///
/// [`EventSink::emit`] never blocks the caller, so a client may invoke it
/// straight from its I/O loop.
#[derive(Debug, Clone)]
pub struct EventSink {
    key: SessionKey,
    tx: mpsc::Sender<RoutedEvent>,
}

impl EventSink {
    /// Returns the session this sink reports for.
    #[must_use]
    pub const fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Queues `event` for routing.
    ///
    /// When the queue is full the event is handed to a background task that
    /// waits for capacity; such events may be routed after later ones.
    /// Events emitted after the router stopped are dropped with a warning.
    pub fn emit(&self, event: ProtocolEvent) {
        let routed = RoutedEvent {
            key: self.key.clone(),
            event,
        };

        match self.tx.try_send(routed) {
            Ok(()) => {}
            Err(TrySendError::Full(routed)) => self.defer(routed),
            Err(TrySendError::Closed(routed)) => {
                tracing::warn!(
                    owner = %self.key.owner,
                    session_id = %self.key.session_id,
                    event_type = %routed.event.kind(),
                    "Event router stopped, dropping event"
                );
            }
        }
    }

    fn defer(&self, routed: RoutedEvent) {
        tracing::debug!(
            owner = %self.key.owner,
            session_id = %self.key.session_id,
            "Event queue full, deferring event"
        );

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(
                owner = %self.key.owner,
                session_id = %self.key.session_id,
                event_type = %routed.event.kind(),
                "Event queue full outside a runtime, dropping event"
            );
            return;
        };

        let tx = self.tx.clone();
        runtime.spawn(async move {
            if let Err(mpsc::error::SendError(routed)) = tx.send(routed).await {
                tracing::warn!(
                    owner = %routed.key.owner,
                    session_id = %routed.key.session_id,
                    event_type = %routed.event.kind(),
                    "Event router stopped, dropping event"
                );
            }
        });
    }
}
