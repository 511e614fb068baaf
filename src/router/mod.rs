//! Event routing from live protocol clients into the stores.
//!
//! Clients never touch a store directly. They hold an [`EventSink`] and push
//! [`ProtocolEvent`](crate::protocol::ProtocolEvent)s into a bounded queue;
//! a single [`EventRouter`] worker drains it and, for every event:
//! - inserts a pending outbox row (when an outbox is configured)
//! - applies the session [`Projection`] the event implies, if any
//!
//! The two effects run independently: a failing outbox insert never blocks
//! or cancels the projection update, and vice versa.

mod projection;
mod sink;
mod worker;

#[cfg(test)]
mod worker_tests;

pub use projection::Projection;
pub use sink::{EventBus, EventSink};
pub use worker::EventRouter;
