//! Background delivery of outbox rows.
//!
//! This module provides:
//! - The polling loop that drains the outbox ([`Dispatcher`])
//! - Its lifecycle handle ([`DispatcherHandle`])
//! - Tuning knobs ([`DispatcherSettings`])
//! - Per-row and per-batch bookkeeping ([`Outcome`], [`BatchSummary`])
//!
//! Exactly one dispatcher must run per outbox; there is no claim or lease
//! mechanism between instances.

mod poller;
mod settings;

#[cfg(test)]
mod poller_tests;

pub use poller::{Dispatcher, DispatcherHandle};
pub use settings::{BatchSummary, DispatcherSettings, Outcome};
