//! Assembly of router, registry and dispatcher over one store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::dispatcher::{Dispatcher, DispatcherHandle, DispatcherSettings};
use crate::outbox::Outbox;
use crate::protocol::ClientFactory;
use crate::registry::ConnectionRegistry;
use crate::router::EventRouter;
use crate::store::{OutboxStore, SessionStore};
use crate::webhook::{HttpClient, WebhookSender};

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;

/// Settings for [`Relay::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Dispatcher loop settings.
    pub dispatcher: DispatcherSettings,
    /// Capacity of the event queue between clients and the router.
    pub event_queue: usize,
    /// Wait before reconnecting persisted sessions.
    pub reconnect_delay: Duration,
}

impl RelaySettings {
    /// Default event queue capacity.
    pub const DEFAULT_EVENT_QUEUE: usize = 1024;

    /// Default reconnect delay (2 seconds).
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

    /// Time granted to the router to drain its queue on shutdown.
    pub const DRAIN_GRACE: Duration = Duration::from_secs(5);
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherSettings::default(),
            event_queue: Self::DEFAULT_EVENT_QUEUE,
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// A running relay: every live client feeds the router, the router feeds the
/// outbox, the dispatcher drains it.
///
/// # Type Parameters
///
/// * `F` - The [`ClientFactory`] building protocol clients
/// * `St` - A store serving both sessions and the outbox
pub struct Relay<F: ClientFactory, St> {
    store: Arc<St>,
    outbox: Outbox<St>,
    registry: Arc<ConnectionRegistry<F, St>>,
    dispatcher: DispatcherHandle,
    router: JoinHandle<()>,
    reconnect: JoinHandle<()>,
}

impl<F, St> Relay<F, St>
where
    F: ClientFactory,
    St: SessionStore + OutboxStore,
{
    /// Starts the router and dispatcher, and schedules a reconnect of every
    /// session persisted as connected after `settings.reconnect_delay`.
    ///
    /// # Panics
    ///
    /// Panics if `settings.event_queue` is zero.
    pub fn start<H: HttpClient>(
        factory: F,
        store: Arc<St>,
        sender: WebhookSender<H>,
        settings: RelaySettings,
    ) -> Self {
        let outbox = Outbox::new(Arc::clone(&store));
        let (bus, router) = EventRouter::new(Arc::clone(&store), Some(outbox.clone()))
            .spawn(settings.event_queue);
        let registry = Arc::new(ConnectionRegistry::new(factory, Arc::clone(&store), bus));

        let dispatcher = Dispatcher::new(Arc::clone(&store), Arc::clone(&store), sender)
            .with_settings(settings.dispatcher)
            .start();

        let reconnect = {
            let registry = Arc::clone(&registry);
            let delay = settings.reconnect_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = registry.reconnect_all().await {
                    tracing::error!("Failed to reconnect sessions: {e}");
                }
            })
        };

        Self {
            store,
            outbox,
            registry,
            dispatcher,
            router,
            reconnect,
        }
    }

    /// The connection registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ConnectionRegistry<F, St>> {
        &self.registry
    }

    /// The outbox façade for external enqueues.
    #[must_use]
    pub const fn outbox(&self) -> &Outbox<St> {
        &self.outbox
    }

    /// The shared store.
    #[must_use]
    pub const fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// Stops the dispatcher after its current poll, then lets the router
    /// drain queued events for up to [`RelaySettings::DRAIN_GRACE`].
    ///
    /// Live clients are dropped without a disconnect so their sessions stay
    /// marked connected and are picked up by the next reconnect.
    pub async fn shutdown(self) {
        let Self {
            registry,
            dispatcher,
            mut router,
            reconnect,
            ..
        } = self;

        reconnect.abort();
        // Cancelled tasks release their registry reference once awaited.
        let _ = reconnect.await;
        dispatcher.stop().await;
        drop(registry);

        if tokio::time::timeout(RelaySettings::DRAIN_GRACE, &mut router)
            .await
            .is_err()
        {
            tracing::warn!("Event router still busy after shutdown grace, aborting");
            router.abort();
        }
    }
}
