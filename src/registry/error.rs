//! Error types for registry operations.

use thiserror::Error;

use crate::protocol::ProtocolError;
use crate::store::StoreError;

/// Errors returned synchronously by [`ConnectionRegistry`](super::ConnectionRegistry).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A connected client already exists for the session.
    #[error("Session is already connected")]
    AlreadyConnected,

    /// No client exists for the session, or it is not connected.
    #[error("Session is not connected")]
    NotConnected,

    /// No client exists for the session.
    #[error("No live client for session")]
    NoSession,

    /// The client is not paired and authenticated.
    #[error("Session is not logged in")]
    NotLoggedIn,

    /// The client is already paired; no pairing code is available.
    #[error("Session is already logged in")]
    AlreadyLoggedIn,

    /// The protocol client failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
