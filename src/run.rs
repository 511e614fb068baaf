//! Application execution logic.
//!
//! This module runs the webhook dispatcher over the store file until a
//! shutdown signal arrives, and implements the store-editing subcommands.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::signal;

use chat_relay::config::ValidatedConfig;
use chat_relay::dispatcher::Dispatcher;
use chat_relay::outbox::Outbox;
use chat_relay::protocol::EventKind;
use chat_relay::session::{Session, Subscriptions};
use chat_relay::store::{FileStore, StoreError};
use chat_relay::webhook::{ReqwestClient, WebhookSender};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// The store file could not be opened.
    #[error("Failed to open store: {0}")]
    StoreOpen(#[source] StoreError),

    /// A store write failed.
    #[error("Store operation failed: {0}")]
    Store(#[source] StoreError),

    /// `--data` is not valid JSON.
    #[error("Invalid event data: {0}")]
    InvalidData(#[source] serde_json::Error),

    /// `--webhook` is not a valid URL.
    #[error("Invalid webhook URL '{url}': {reason}")]
    InvalidWebhook {
        /// The rejected URL
        url: String,
        /// Parser error
        reason: String,
    },
}

/// Runs the dispatcher until Ctrl+C or SIGTERM.
///
/// The poll in progress when the signal arrives is allowed to finish.
///
/// # Errors
///
/// Returns an error if the store file cannot be opened.
///
/// # Coverage Note
///
/// This function is excluded from coverage because it waits for OS signals.
#[cfg(not(tarpaulin_include))]
pub async fn execute(config: ValidatedConfig) -> Result<(), RunError> {
    let store = Arc::new(open_store(&config).await?);
    tracing::info!("Store: {}", store.path().display());

    let handle = Dispatcher::new(Arc::clone(&store), Arc::clone(&store), create_sender(&config))
        .with_settings(config.dispatcher_settings())
        .start();

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping...");
    handle.stop().await;

    Ok(())
}

/// Inserts one pending event into the store and returns its id.
///
/// # Errors
///
/// Returns an error if `data` is not JSON or the store cannot be written.
pub async fn enqueue(
    config: &ValidatedConfig,
    owner: &str,
    session: Option<&str>,
    event: &str,
    data: &str,
) -> Result<i64, RunError> {
    let payload: Value = serde_json::from_str(data).map_err(RunError::InvalidData)?;
    if event.parse::<EventKind>().is_err() {
        tracing::warn!(event_type = event, "Not a protocol event type, enqueuing anyway");
    }

    let outbox = Outbox::new(Arc::new(open_store(config).await?));
    let result = match session {
        Some(session_id) => {
            outbox
                .enqueue_for_session(owner, session_id, event, payload)
                .await
        }
        None => outbox.enqueue(owner, event, payload).await,
    };

    result.map_err(RunError::Store)
}

/// Creates a session record and returns it.
///
/// Unknown names in `events` are dropped.
///
/// # Errors
///
/// Returns an error if the webhook URL is invalid, the name is taken, or the
/// store cannot be written.
pub async fn add_session(
    config: &ValidatedConfig,
    owner: &str,
    name: &str,
    webhook: Option<&str>,
    events: &str,
) -> Result<Session, RunError> {
    let webhook = webhook.unwrap_or_default();
    if !webhook.is_empty() {
        url::Url::parse(webhook).map_err(|e| RunError::InvalidWebhook {
            url: webhook.to_string(),
            reason: e.to_string(),
        })?;
    }

    let session =
        Session::new(owner, name).with_webhook(webhook, Subscriptions::parse_list(events));
    let store = open_store(config).await?;
    store
        .insert_session(session.clone())
        .await
        .map_err(RunError::Store)?;

    Ok(session)
}

async fn open_store(config: &ValidatedConfig) -> Result<FileStore, RunError> {
    FileStore::open(config.store_path.clone())
        .await
        .map_err(RunError::StoreOpen)
}

/// Creates the webhook sender from configuration.
fn create_sender(config: &ValidatedConfig) -> WebhookSender<ReqwestClient> {
    WebhookSender::new(ReqwestClient::new())
        .with_user_agent(config.user_agent.clone())
        .with_timeout(config.send_timeout)
}

/// Returns a future that completes when a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
