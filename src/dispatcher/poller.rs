//! Timer-driven outbox poller.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::outbox::{EventStatus, WebhookEvent};
use crate::session::Session;
use crate::store::{OutboxStore, SessionStore, StoreError};
use crate::time::{Clock, SystemClock};
use crate::webhook::{DeliveryError, HttpClient, HttpError, WebhookPayload, WebhookSender};

use super::{BatchSummary, DispatcherSettings, Outcome};

/// Drains the outbox on a fixed cadence and delivers rows to session webhooks.
///
/// Each poll fetches up to `batch_size` pending rows, oldest first, and
/// processes them one after another:
///
/// 1. No session reference, unknown session, or session of another owner: `failed`
/// 2. Session without webhook URL: `failed`
/// 3. Event type not subscribed: `sent`, no HTTP call
/// 4. Otherwise one POST; success is `sent`, failure consumes an attempt
///
/// Retries happen on later polls; there is no backoff beyond the poll cadence.
///
/// # Type Parameters
///
/// * `O` - The [`OutboxStore`] holding webhook rows
/// * `S` - The [`SessionStore`] used to resolve webhook configuration
/// * `H` - The [`HttpClient`] behind the [`WebhookSender`]
/// * `C` - The [`Clock`] used for the retention cutoff (defaults to [`SystemClock`])
pub struct Dispatcher<O, S, H, C = SystemClock> {
    outbox: Arc<O>,
    sessions: Arc<S>,
    sender: WebhookSender<H>,
    settings: DispatcherSettings,
    clock: C,
}

impl<O, S, H> Dispatcher<O, S, H, SystemClock> {
    /// Creates a dispatcher with default settings.
    #[must_use]
    pub fn new(outbox: Arc<O>, sessions: Arc<S>, sender: WebhookSender<H>) -> Self {
        Self {
            outbox,
            sessions,
            sender,
            settings: DispatcherSettings::default(),
            clock: SystemClock,
        }
    }
}

impl<O, S, H, C> Dispatcher<O, S, H, C> {
    /// Replaces the loop settings.
    #[must_use]
    pub fn with_settings(mut self, settings: DispatcherSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock<C2>(self, clock: C2) -> Dispatcher<O, S, H, C2> {
        Dispatcher {
            outbox: self.outbox,
            sessions: self.sessions,
            sender: self.sender,
            settings: self.settings,
            clock,
        }
    }

    /// Returns the loop settings.
    #[must_use]
    pub const fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }
}

impl<O, S, H, C> Dispatcher<O, S, H, C>
where
    O: OutboxStore,
    S: SessionStore,
    H: HttpClient,
    C: Clock + 'static,
{
    /// Runs one poll: fetches a batch and processes every row in order.
    ///
    /// Failures to write a row's new status are logged and counted in
    /// [`BatchSummary::errors`]; the row stays as it was.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the batch cannot be fetched.
    pub async fn process_pending(&self) -> Result<BatchSummary, StoreError> {
        let batch = self
            .outbox
            .fetch_pending_batch(self.settings.batch_size)
            .await?;

        let mut summary = BatchSummary::default();
        for event in &batch {
            match self.process_event(event).await {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    tracing::error!(event_id = event.id, "Failed to update webhook event: {e}");
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Applies the delivery state machine to a single pending row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the row's new status cannot be written.
    pub async fn process_event(&self, event: &WebhookEvent) -> Result<Outcome, StoreError> {
        let session = match self.resolve_session(event).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::warn!(
                    event_id = event.id,
                    owner = %event.owner,
                    session_id = event.session_ref().unwrap_or_default(),
                    "Webhook event has no resolvable session, marking failed"
                );
                self.outbox.mark_failed(event.id).await?;
                return Ok(Outcome::Orphaned);
            }
            Err(e) => {
                tracing::error!(
                    event_id = event.id,
                    "Failed to resolve session, leaving event pending: {e}"
                );
                return Ok(Outcome::Deferred);
            }
        };

        if !session.has_webhook() {
            tracing::warn!(
                event_id = event.id,
                session_id = %session.id,
                "Session has no webhook URL, marking failed"
            );
            self.outbox.mark_failed(event.id).await?;
            return Ok(Outcome::NoWebhook);
        }

        if !session.events.allows(&event.event_type) {
            tracing::debug!(
                event_id = event.id,
                event_type = %event.event_type,
                "Event type not subscribed, skipping delivery"
            );
            self.outbox.mark_sent(event.id).await?;
            return Ok(Outcome::Filtered);
        }

        match self.deliver(&session.webhook_url, event).await {
            Ok(()) => {
                self.outbox.mark_sent(event.id).await?;
                tracing::debug!(
                    event_id = event.id,
                    event_type = %event.event_type,
                    "Webhook delivered"
                );
                Ok(Outcome::Delivered)
            }
            Err(e) => {
                let attempts = event.attempts + 1;
                match self.outbox.record_failure(event.id).await? {
                    EventStatus::Failed => {
                        tracing::warn!(
                            event_id = event.id,
                            attempts,
                            "Webhook delivery failed permanently: {e}"
                        );
                        Ok(Outcome::Exhausted)
                    }
                    EventStatus::Pending | EventStatus::Sent => {
                        tracing::warn!(
                            event_id = event.id,
                            attempts,
                            "Webhook delivery failed, will retry: {e}"
                        );
                        Ok(Outcome::Retrying)
                    }
                }
            }
        }
    }

    /// Deletes terminal rows older than the configured retention.
    ///
    /// Returns 0 without touching the store when retention is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the purge fails.
    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        let Some(retention) = self.settings.retention else {
            return Ok(0);
        };
        let cutoff = self
            .clock
            .now()
            .checked_sub(retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.outbox.purge_terminal_before(cutoff).await
    }

    /// Looks up the row's session, rejecting sessions owned by someone else.
    async fn resolve_session(&self, event: &WebhookEvent) -> Result<Option<Session>, StoreError> {
        let Some(session_id) = event.session_ref() else {
            return Ok(None);
        };
        let session = self.sessions.get_by_id(session_id).await?;
        Ok(session.filter(|s| s.owner == event.owner))
    }

    /// One bounded delivery attempt.
    async fn deliver(&self, url: &str, event: &WebhookEvent) -> Result<(), DeliveryError> {
        let payload = WebhookPayload::from(event);
        time::timeout(self.sender.timeout(), self.sender.send(url, &payload))
            .await
            .map_err(|_| DeliveryError::Http(HttpError::Timeout))?
    }

    /// Runs one poll and logs its result.
    async fn poll_once(&self) {
        match self.process_pending().await {
            Ok(summary) if !summary.is_empty() => {
                tracing::debug!(
                    delivered = summary.delivered,
                    filtered = summary.filtered,
                    retrying = summary.retrying,
                    failed = summary.failed,
                    deferred = summary.deferred,
                    errors = summary.errors,
                    "Processed webhook batch"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Failed to fetch pending webhook events: {e}"),
        }
    }

    /// Purges expired rows at most once per [`DispatcherSettings::PURGE_INTERVAL`].
    async fn purge_if_due(&self, last_purge: &mut Option<Instant>) {
        if self.settings.retention.is_none() {
            return;
        }
        let now = Instant::now();
        if last_purge.is_some_and(|at| now.duration_since(at) < DispatcherSettings::PURGE_INTERVAL)
        {
            return;
        }
        *last_purge = Some(now);

        match self.purge_expired().await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Purged expired webhook events"),
            Err(e) => tracing::error!("Failed to purge webhook events: {e}"),
        }
    }

    /// The loop body; returns once `stop` fires or its sender is dropped.
    async fn run(self, mut stop: watch::Receiver<bool>) {
        let period = self.settings.poll_interval;
        tracing::info!(
            poll_interval_secs = period.as_secs_f64(),
            batch_size = self.settings.batch_size,
            "Webhook dispatcher started"
        );

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_purge = None;

        loop {
            tokio::select! {
                biased;

                _ = stop.changed() => break,

                _ = ticker.tick() => {
                    self.poll_once().await;
                    self.purge_if_due(&mut last_purge).await;
                }
            }
        }

        tracing::info!("Webhook dispatcher stopped");
    }

    /// Spawns the loop on the current runtime.
    ///
    /// The first poll happens one `poll_interval` after this call.
    #[must_use = "dropping the handle stops the dispatcher without waiting for it"]
    pub fn start(self) -> DispatcherHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        DispatcherHandle { stop_tx, task }
    }
}

/// Handle to a running dispatcher.
#[derive(Debug)]
pub struct DispatcherHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signals the loop to stop and waits for the current poll to finish.
    ///
    /// A batch in progress is never interrupted.
    pub async fn stop(self) {
        // Fails only when the loop already exited.
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Webhook dispatcher task failed: {e}");
        }
    }

    /// Returns true if the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
