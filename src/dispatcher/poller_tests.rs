//! Tests for the outbox dispatcher.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::{BatchSummary, Dispatcher, DispatcherSettings, Outcome};
use crate::outbox::{EventStatus, MAX_ATTEMPTS, Outbox};
use crate::session::{Session, Subscriptions};
use crate::store::{MemoryStore, OutboxStore, SessionStore, StoreError};
use crate::time::mock::ManualClock;
use crate::webhook::mock::MockHttpClient;
use crate::webhook::{HttpError, WebhookSender};

const URL: &str = "http://x/y";

type TestDispatcher<S = MemoryStore> = Dispatcher<MemoryStore, S, Arc<MockHttpClient>>;

struct Fixture {
    store: Arc<MemoryStore>,
    http: Arc<MockHttpClient>,
    dispatcher: TestDispatcher,
}

impl Fixture {
    fn new(http: MockHttpClient) -> Self {
        let store = Arc::new(MemoryStore::new());
        let http = Arc::new(http);
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&store),
            WebhookSender::new(Arc::clone(&http)),
        );
        Self {
            store,
            http,
            dispatcher,
        }
    }

    fn outbox(&self) -> Outbox<MemoryStore> {
        Outbox::new(Arc::clone(&self.store))
    }

    fn add_session(&self, webhook: &str, events: &str) -> Session {
        let session =
            Session::new("alice", "main").with_webhook(webhook, Subscriptions::parse_list(events));
        self.store.insert_session(session.clone()).unwrap();
        session
    }

    async fn enqueue(&self, session: &Session, event_type: &str) -> i64 {
        self.outbox()
            .enqueue_for_session(&session.owner, &session.id, event_type, json!({"jid": "123@s"}))
            .await
            .unwrap()
    }

    fn status(&self, id: i64) -> (EventStatus, u32) {
        let event = self.store.event(id).unwrap();
        (event.status, event.attempts)
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn delivers_subscribed_event_and_marks_sent() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Connected").await;

        let summary = fx.dispatcher.process_pending().await.unwrap();

        assert_eq!(summary.delivered, 1);
        assert_eq!(fx.status(id), (EventStatus::Sent, 0));
        let requests = fx.http.captured_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.as_str(), URL);
        let body = &fx.http.captured_bodies()[0];
        assert_eq!(body["event"], "Connected");
        assert_eq!(body["data"], json!({"jid": "123@s"}));
        assert!(body["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn unsubscribed_event_is_sent_without_http_call() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "Message");
        let id = fx.enqueue(&session, "Connected").await;

        let summary = fx.dispatcher.process_pending().await.unwrap();

        assert_eq!(summary.filtered, 1);
        assert_eq!(fx.status(id), (EventStatus::Sent, 0));
        assert_eq!(fx.http.calls(), 0);
    }

    #[tokio::test]
    async fn server_error_three_times_ends_failed() {
        let fx = Fixture::new(MockHttpClient::always(500));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Connected").await;

        for expected in 1..MAX_ATTEMPTS {
            fx.dispatcher.process_pending().await.unwrap();
            assert_eq!(fx.status(id), (EventStatus::Pending, expected));
        }
        let summary = fx.dispatcher.process_pending().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(fx.status(id), (EventStatus::Failed, MAX_ATTEMPTS));
        assert_eq!(fx.http.calls(), 3);
    }

    #[tokio::test]
    async fn session_without_webhook_fails_without_attempt() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session("", "All");
        let id = fx.enqueue(&session, "Message").await;

        let summary = fx.dispatcher.process_pending().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(fx.status(id), (EventStatus::Failed, 0));
        assert_eq!(fx.http.calls(), 0);
    }
}

mod state_machine {
    use super::*;

    #[tokio::test]
    async fn owner_level_event_is_orphaned() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let id = fx
            .outbox()
            .enqueue("alice", "Connected", json!({}))
            .await
            .unwrap();

        let row = fx.store.event(id).unwrap();
        let outcome = fx.dispatcher.process_event(&row).await.unwrap();

        assert_eq!(outcome, Outcome::Orphaned);
        assert_eq!(fx.status(id), (EventStatus::Failed, 0));
    }

    #[tokio::test]
    async fn deleted_session_is_orphaned() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Message").await;
        fx.store.remove_session(&session.id);

        fx.dispatcher.process_pending().await.unwrap();

        assert_eq!(fx.status(id), (EventStatus::Failed, 0));
        assert_eq!(fx.http.calls(), 0);
    }

    #[tokio::test]
    async fn session_of_another_owner_is_orphaned() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "All");
        let id = fx
            .outbox()
            .enqueue_for_session("mallory", &session.id, "Message", json!({}))
            .await
            .unwrap();

        let row = fx.store.event(id).unwrap();
        assert_eq!(
            fx.dispatcher.process_event(&row).await.unwrap(),
            Outcome::Orphaned
        );
        assert_eq!(fx.http.calls(), 0);
    }

    #[tokio::test]
    async fn transient_failure_then_success() {
        let http = MockHttpClient::scripted(vec![Err(HttpError::Timeout)], 200);
        let fx = Fixture::new(http);
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Message").await;

        let first = fx.dispatcher.process_pending().await.unwrap();
        let second = fx.dispatcher.process_pending().await.unwrap();

        assert_eq!(first.retrying, 1);
        assert_eq!(second.delivered, 1);
        assert_eq!(fx.status(id), (EventStatus::Sent, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_endpoint_is_cut_off_by_send_timeout() {
        let fx = Fixture::new(MockHttpClient::always(200).with_delay(Duration::from_secs(3_600)));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Message").await;
        let event = fx.store.event(id).unwrap();
        let started = tokio::time::Instant::now();

        let outcome = fx.dispatcher.process_event(&event).await.unwrap();

        assert_eq!(outcome, Outcome::Retrying);
        assert_eq!(fx.status(id), (EventStatus::Pending, 1));
        let elapsed = started.elapsed();
        assert!(elapsed >= WebhookSender::<MockHttpClient>::DEFAULT_TIMEOUT);
        assert!(elapsed < Duration::from_secs(11));
        assert_eq!(fx.http.calls(), 1);
    }

    #[tokio::test]
    async fn client_errors_consume_the_same_budget() {
        let fx = Fixture::new(MockHttpClient::always(404));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Message").await;

        for _ in 0..5 {
            fx.dispatcher.process_pending().await.unwrap();
        }

        assert_eq!(fx.status(id), (EventStatus::Failed, MAX_ATTEMPTS));
        assert_eq!(fx.http.calls(), 3);
    }

    #[tokio::test]
    async fn redirect_status_counts_as_delivered() {
        let fx = Fixture::new(MockHttpClient::always(302));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Message").await;

        fx.dispatcher.process_pending().await.unwrap();

        assert_eq!(fx.status(id).0, EventStatus::Sent);
    }

    #[tokio::test]
    async fn terminal_rows_are_not_reprocessed() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "All");
        fx.enqueue(&session, "Message").await;

        fx.dispatcher.process_pending().await.unwrap();
        let second = fx.dispatcher.process_pending().await.unwrap();

        assert_eq!(second, BatchSummary::default());
        assert_eq!(fx.http.calls(), 1);
    }
}

mod batching {
    use super::*;

    #[tokio::test]
    async fn n_enqueues_yield_n_distinct_rows() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "All");

        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(fx.enqueue(&session, "Message").await);
        }
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 10);
        assert_eq!(fx.store.events().len(), 10);
    }

    #[tokio::test]
    async fn concurrent_enqueues_yield_n_rows() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let outbox = fx.outbox();

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let outbox = outbox.clone();
                tokio::spawn(async move {
                    outbox
                        .enqueue_for_session("alice", "s1", "Message", json!({"n": i}))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(fx.store.events().len(), 20);
    }

    #[tokio::test]
    async fn rows_are_delivered_in_creation_order() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "All");
        for kind in ["Message", "Presence", "ReadReceipt"] {
            fx.enqueue(&session, kind).await;
        }

        fx.dispatcher.process_pending().await.unwrap();

        let kinds: Vec<_> = fx
            .http
            .captured_bodies()
            .iter()
            .map(|b| b["event"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, ["Message", "Presence", "ReadReceipt"]);
    }

    #[tokio::test]
    async fn batch_size_limits_one_poll() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let dispatcher = fx
            .dispatcher
            .with_settings(DispatcherSettings::default().with_batch_size(2));
        let session = Session::new("alice", "main").with_webhook(URL, Subscriptions::all());
        fx.store.insert_session(session.clone()).unwrap();
        for _ in 0..5 {
            Outbox::new(Arc::clone(&fx.store))
                .enqueue_for_session("alice", &session.id, "Message", json!({}))
                .await
                .unwrap();
        }

        let summary = dispatcher.process_pending().await.unwrap();

        assert_eq!(summary.total(), 2);
        assert_eq!(fx.http.calls(), 2);
    }
}

/// Session store whose lookups always fail.
struct UnavailableSessions;

impl SessionStore for UnavailableSessions {
    async fn get_by_id(&self, _id: &str) -> Result<Option<Session>, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }

    async fn get_by_owner_and_name(
        &self,
        _owner: &str,
        _name: &str,
    ) -> Result<Option<Session>, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }

    async fn list_connected(&self) -> Result<Vec<Session>, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }

    async fn update_connected(&self, _id: &str, _connected: bool) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }

    async fn update_identity(&self, _id: &str, _identity: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }

    async fn update_qr_code(&self, _id: &str, _code: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }

    async fn update_webhook_config(
        &self,
        _id: &str,
        _url: &str,
        _events: &Subscriptions,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }
}

#[tokio::test]
async fn session_lookup_error_leaves_row_untouched() {
    let outbox = Arc::new(MemoryStore::new());
    let http = Arc::new(MockHttpClient::always(200));
    let dispatcher: TestDispatcher<UnavailableSessions> = Dispatcher::new(
        Arc::clone(&outbox),
        Arc::new(UnavailableSessions),
        WebhookSender::new(Arc::clone(&http)),
    );
    let id = outbox
        .insert_pending("alice", Some("s1"), "Message", json!({}))
        .await
        .unwrap();

    let summary = dispatcher.process_pending().await.unwrap();

    assert_eq!(summary.deferred, 1);
    let row = outbox.event(id).unwrap();
    assert_eq!((row.status, row.attempts), (EventStatus::Pending, 0));
    assert_eq!(http.calls(), 0);
}

mod retention {
    use super::*;

    #[tokio::test]
    async fn purge_is_noop_without_retention() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session("", "All");
        fx.enqueue(&session, "Message").await;
        fx.dispatcher.process_pending().await.unwrap();

        assert_eq!(fx.dispatcher.purge_expired().await.unwrap(), 0);
        assert_eq!(fx.store.events().len(), 1);
    }

    #[tokio::test]
    async fn purge_removes_old_terminal_rows_only() {
        let store = Arc::new(MemoryStore::with_clock(ManualClock::new(1_000)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&store),
            WebhookSender::new(Arc::new(MockHttpClient::always(200))),
        )
        .with_settings(
            DispatcherSettings::default().with_retention(Some(Duration::from_secs(3_600))),
        )
        .with_clock(ManualClock::new(1_000 + 7_200));

        let done = store
            .insert_pending("alice", None, "Message", json!({}))
            .await
            .unwrap();
        store.mark_failed(done).await.unwrap();
        let pending = store
            .insert_pending("alice", Some("s1"), "Message", json!({}))
            .await
            .unwrap();

        assert_eq!(dispatcher.purge_expired().await.unwrap(), 1);
        assert!(store.event(done).is_none());
        assert!(store.event(pending).is_some());
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn started_loop_polls_on_its_interval() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Connected").await;
        let store = Arc::clone(&fx.store);
        let http = Arc::clone(&fx.http);

        let handle = fx.dispatcher.start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.event(id).unwrap().status, EventStatus::Pending);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.event(id).unwrap().status, EventStatus::Sent);
        assert_eq!(http.calls(), 1);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn retries_happen_on_later_polls() {
        let fx = Fixture::new(MockHttpClient::always(500));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Connected").await;
        let store = Arc::clone(&fx.store);

        let handle = fx.dispatcher.start();
        tokio::time::sleep(Duration::from_secs(20)).await;
        handle.stop().await;

        let row = store.event(id).unwrap();
        assert_eq!((row.status, row.attempts), (EventStatus::Failed, MAX_ATTEMPTS));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop_before_next_poll() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Message").await;
        let store = Arc::clone(&fx.store);
        let http = Arc::clone(&fx.http);

        let handle = fx.dispatcher.start();
        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(store.event(id).unwrap().status, EventStatus::Pending);
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_the_batch_in_flight() {
        let fx = Fixture::new(MockHttpClient::always(200).with_delay(Duration::from_secs(5)));
        let session = fx.add_session(URL, "All");
        let first = fx.enqueue(&session, "Message").await;
        let second = fx.enqueue(&session, "Message").await;
        let store = Arc::clone(&fx.store);
        let http = Arc::clone(&fx.http);

        let handle = fx.dispatcher.start();
        // First poll at 2s, first request still in flight at 2.5s.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(http.calls(), 1);
        handle.stop().await;

        assert_eq!(store.event(first).unwrap().status, EventStatus::Sent);
        assert_eq!(store.event(second).unwrap().status, EventStatus::Sent);
        assert_eq!(http.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_stops_the_loop() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let session = fx.add_session(URL, "All");
        let id = fx.enqueue(&session, "Message").await;
        let store = Arc::clone(&fx.store);
        let http = Arc::clone(&fx.http);

        drop(fx.dispatcher.start());
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(store.event(id).unwrap().status, EventStatus::Pending);
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_loop_keeps_running_until_stopped() {
        let fx = Fixture::new(MockHttpClient::always(200));
        let handle = fx.dispatcher.start();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(!handle.is_finished());

        handle.stop().await;
    }
}

mod summary {
    use super::*;

    #[test]
    fn record_groups_terminal_failures() {
        let mut summary = BatchSummary::default();
        for outcome in [
            Outcome::Exhausted,
            Outcome::Orphaned,
            Outcome::NoWebhook,
            Outcome::Delivered,
            Outcome::Filtered,
            Outcome::Retrying,
            Outcome::Deferred,
        ] {
            summary.record(outcome);
        }

        assert_eq!(summary.failed, 3);
        assert_eq!(summary.total(), 7);
        assert!(!summary.is_empty());
    }

    #[test]
    fn terminal_outcomes() {
        assert!(Outcome::Filtered.is_terminal());
        assert!(Outcome::Orphaned.is_terminal());
        assert!(!Outcome::Retrying.is_terminal());
        assert!(!Outcome::Deferred.is_terminal());
    }

    #[test]
    fn default_settings() {
        let settings = DispatcherSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.retention, None);
    }
}
