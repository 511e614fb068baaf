//! chat-relay: multi-tenant chat session registry with a durable webhook outbox
//!
//! A library for running many protocol client sessions per tenant, routing
//! their events into a persistent outbox, and delivering those events to
//! per-session webhooks with bounded retries.

pub mod config;
pub mod dispatcher;
pub mod outbox;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod router;
pub mod session;
pub mod store;
pub mod time;
pub mod webhook;
