//! Live protocol client registry.
//!
//! This module provides:
//! - The registry of live clients keyed by owner and session ([`ConnectionRegistry`])
//! - Its error type ([`RegistryError`])
//! - Snapshots returned to callers ([`ConnectInfo`], [`SessionStatus`], [`ReconnectSummary`])
//!
//! At most one client is live per [`SessionKey`](crate::session::SessionKey).
//! Operations on one key are serialized; operations on different keys never
//! wait on each other, and handle lookups never wait at all.

mod connections;
mod error;
mod status;
mod table;

#[cfg(test)]
pub(crate) mod mock;


pub use connections::ConnectionRegistry;
pub use error::RegistryError;
pub use status::{ConnectInfo, ReconnectSummary, SessionStatus};
