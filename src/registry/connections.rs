//! Connect, disconnect and reconnect of protocol clients.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::protocol::{ClientFactory, ProtocolClient};
use crate::router::EventBus;
use crate::session::{Session, SessionKey};
use crate::store::SessionStore;

use super::table::HandleTable;
use super::{ConnectInfo, ReconnectSummary, RegistryError, SessionStatus};

/// Owns every live protocol client.
///
/// Clients are created by the factory `F` and report their events through a
/// sink minted from the router's [`EventBus`]. The registry writes the
/// session's `connected` and `identity` fields on connect, disconnect and
/// logout; all other projections come from the router.
///
/// # Type Parameters
///
/// * `F` - The [`ClientFactory`] building protocol clients
/// * `S` - The [`SessionStore`] holding session records
pub struct ConnectionRegistry<F: ClientFactory, S> {
    factory: F,
    sessions: Arc<S>,
    bus: EventBus,
    table: HandleTable<F::Client>,
}

impl<F, S> ConnectionRegistry<F, S>
where
    F: ClientFactory,
    S: SessionStore,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new(factory: F, sessions: Arc<S>, bus: EventBus) -> Self {
        Self {
            factory,
            sessions,
            bus,
            table: HandleTable::new(),
        }
    }

    /// Returns the live client for a session, without waiting on any lock
    /// held by a connect in progress.
    #[must_use]
    pub fn get_handle(&self, owner: &str, session_id: &str) -> Option<Arc<F::Client>> {
        self.table.get(&SessionKey::new(owner, session_id))
    }

    /// Number of live clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no client is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates, connects and registers a client for `session`.
    ///
    /// A registered client that no longer reports connected is torn down
    /// and replaced.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::AlreadyConnected`] if a connected client exists
    /// - [`RegistryError::Protocol`] if the client cannot be created or connected
    pub async fn connect(
        &self,
        owner: &str,
        session: &Session,
    ) -> Result<ConnectInfo, RegistryError> {
        let key = SessionKey::new(owner, &session.id);
        let _guard = self.table.lock(&key).await;

        if let Some(existing) = self.table.get(&key) {
            if existing.is_connected() {
                return Err(RegistryError::AlreadyConnected);
            }
            tracing::debug!(%owner, session_id = %session.id, "Replacing stale client");
            self.table.remove(&key);
            existing.disconnect().await;
        }

        let client = self
            .factory
            .create(session, self.bus.sink(key.clone()))
            .await?;
        client.connect().await?;

        let client = Arc::new(client);
        self.table.insert(key, Arc::clone(&client));
        self.persist_connected(&session.id, true).await;

        let mut identity = session.identity.clone();
        if client.is_logged_in() {
            if let Some(resolved) = client.identity() {
                if let Err(e) = self.sessions.update_identity(&session.id, &resolved).await {
                    tracing::error!(session_id = %session.id, "Failed to store identity: {e}");
                }
                identity = resolved;
            }
        }

        tracing::info!(%owner, session_id = %session.id, name = %session.name, "Session connected");

        Ok(ConnectInfo {
            name: session.name.clone(),
            webhook_url: session.webhook_url.clone(),
            identity,
            events: session.events.clone(),
        })
    }

    /// Closes and unregisters the session's client.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotConnected`] if there is no client or it is not connected.
    pub async fn disconnect(&self, owner: &str, session: &Session) -> Result<(), RegistryError> {
        let key = SessionKey::new(owner, &session.id);
        let _guard = self.table.lock(&key).await;

        let client = self
            .table
            .get(&key)
            .filter(|c| c.is_connected())
            .ok_or(RegistryError::NotConnected)?;

        client.disconnect().await;
        self.table.remove(&key);
        self.persist_connected(&session.id, false).await;

        tracing::info!(%owner, session_id = %session.id, "Session disconnected");
        Ok(())
    }

    /// Invalidates the session's pairing, then unregisters its client.
    ///
    /// The stored identity is cleared.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotConnected`] if there is no client
    /// - [`RegistryError::NotLoggedIn`] if the client is not connected and logged in
    /// - [`RegistryError::Protocol`] if the remote logout fails; the client stays registered
    pub async fn logout(&self, owner: &str, session: &Session) -> Result<(), RegistryError> {
        let key = SessionKey::new(owner, &session.id);
        let _guard = self.table.lock(&key).await;

        let client = self.table.get(&key).ok_or(RegistryError::NotConnected)?;
        if !(client.is_connected() && client.is_logged_in()) {
            return Err(RegistryError::NotLoggedIn);
        }

        client.logout().await?;
        self.table.remove(&key);
        self.persist_connected(&session.id, false).await;
        if let Err(e) = self.sessions.update_identity(&session.id, "").await {
            tracing::error!(session_id = %session.id, "Failed to clear identity: {e}");
        }

        tracing::info!(%owner, session_id = %session.id, "Session logged out");
        Ok(())
    }

    /// Reports live connection state merged with the session record.
    #[must_use]
    pub fn status(&self, owner: &str, session: &Session) -> SessionStatus {
        let client = self.get_handle(owner, &session.id);
        let (connected, logged_in) = client
            .as_ref()
            .map_or((false, false), |c| (c.is_connected(), c.is_logged_in()));

        SessionStatus {
            id: session.id.clone(),
            name: session.name.clone(),
            connected,
            logged_in,
            identity: session.identity.clone(),
            webhook_url: session.webhook_url.clone(),
            events: session.events.clone(),
        }
    }

    /// Returns the latest pairing code of a connected, unpaired session.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NoSession`] if there is no client or no session record
    /// - [`RegistryError::NotConnected`] if the client is not connected
    /// - [`RegistryError::AlreadyLoggedIn`] if the device is already paired
    /// - [`RegistryError::Store`] if the session cannot be read
    pub async fn qr_code(&self, owner: &str, session_id: &str) -> Result<String, RegistryError> {
        let client = self
            .get_handle(owner, session_id)
            .ok_or(RegistryError::NoSession)?;
        if !client.is_connected() {
            return Err(RegistryError::NotConnected);
        }
        if client.is_logged_in() {
            return Err(RegistryError::AlreadyLoggedIn);
        }

        self.sessions
            .get_by_id(session_id)
            .await?
            .map(|s| s.qr_code)
            .ok_or(RegistryError::NoSession)
    }

    /// Drops the client of a session that is being deleted.
    ///
    /// Does nothing if no client is registered. The session record is left
    /// to the caller.
    pub async fn remove(&self, owner: &str, session_id: &str) {
        let key = SessionKey::new(owner, session_id);
        let _guard = self.table.lock(&key).await;
        if let Some(client) = self.table.remove(&key) {
            client.disconnect().await;
            tracing::info!(%owner, %session_id, "Session client removed");
        }
    }

    async fn persist_connected(&self, session_id: &str, connected: bool) {
        if let Err(e) = self.sessions.update_connected(session_id, connected).await {
            tracing::error!(%session_id, connected, "Failed to store connected flag: {e}");
        }
    }

    #[cfg(test)]
    pub(super) fn lock_entries(&self) -> usize {
        self.table.lock_entries()
    }

    /// Reconnects every session persisted as connected, one task per session.
    ///
    /// A failed reconnect clears that session's `connected` flag and does not
    /// affect the others.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Store`] if the connected sessions cannot be listed.
    pub async fn reconnect_all(self: &Arc<Self>) -> Result<ReconnectSummary, RegistryError> {
        let sessions = self.sessions.list_connected().await?;
        tracing::info!(count = sessions.len(), "Reconnecting sessions");

        let mut tasks = JoinSet::new();
        for session in sessions {
            let registry = Arc::clone(self);
            tasks.spawn(async move {
                let result = registry.connect(&session.owner, &session).await;
                (session, result)
            });
        }

        let mut summary = ReconnectSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => summary.connected += 1,
                Ok((_, Err(RegistryError::AlreadyConnected))) => summary.already_connected += 1,
                Ok((session, Err(e))) => {
                    tracing::warn!(
                        owner = %session.owner,
                        session_id = %session.id,
                        "Failed to reconnect session: {e}"
                    );
                    self.persist_connected(&session.id, false).await;
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Reconnect task failed: {e}");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            connected = summary.connected,
            already_connected = summary.already_connected,
            failed = summary.failed,
            "Reconnect finished"
        );
        Ok(summary)
    }
}
