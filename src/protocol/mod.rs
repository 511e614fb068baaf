//! Protocol client seam.
//!
//! The chat protocol itself (transport, encryption, device pairing) lives in
//! an external library. This module defines what the relay consumes from it:
//! - A live client handle ([`ProtocolClient`])
//! - A constructor for new handles ([`ClientFactory`])
//! - The closed set of events a client can emit ([`ProtocolEvent`], [`EventKind`])

mod event;


pub use event::{EventKind, ProtocolEvent, UnknownEventKind};

use std::future::Future;

use thiserror::Error;

use crate::router::EventSink;
use crate::session::Session;

/// Errors reported by the external protocol client.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The client could not be constructed (device store, credentials).
    #[error("Failed to create client: {0}")]
    Create(String),

    /// Connecting to the chat network failed.
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// Invalidating the remote authentication failed.
    #[error("Failed to logout: {0}")]
    Logout(String),
}

/// A live protocol client bound to one session.
///
/// Implementations drive their own I/O loop and report everything that
/// happens on the connection through the [`EventSink`] they were created with.
pub trait ProtocolClient: Send + Sync + 'static {
    /// Connects to the chat network.
    ///
    /// May block on network I/O. An unpaired device starts a pairing flow
    /// whose codes arrive as [`ProtocolEvent::Qr`] events.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Connect`] if the connection cannot be established.
    fn connect(&self) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Closes the connection, keeping the device paired.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    /// Invalidates the remote authentication and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Logout`] if the remote side rejects the request.
    fn logout(&self) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Returns whether the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Returns whether the device is paired and authenticated.
    fn is_logged_in(&self) -> bool;

    /// Returns the protocol identity of the paired device, if any.
    fn identity(&self) -> Option<String>;
}

/// Builds protocol clients for sessions.
///
/// The factory receives the [`EventSink`] the new client must report into;
/// this is how the event router is registered as the client's callback target.
pub trait ClientFactory: Send + Sync + 'static {
    /// The client type this factory produces.
    type Client: ProtocolClient;

    /// Creates a new, not yet connected client for `session`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Create`] if the client cannot be built.
    fn create(
        &self,
        session: &Session,
        sink: EventSink,
    ) -> impl Future<Output = Result<Self::Client, ProtocolError>> + Send;
}
