//! Tests for the event router worker and sinks.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::{Value, json};

use super::EventRouter;
use crate::outbox::{EventStatus, Outbox, WebhookEvent};
use crate::protocol::ProtocolEvent;
use crate::session::Session;
use crate::store::{MemoryStore, OutboxStore, SessionStore, StoreError};

type Router = EventRouter<MemoryStore, MemoryStore>;

fn setup() -> (Arc<MemoryStore>, Session, Router) {
    let store = Arc::new(MemoryStore::new());
    let session = Session::new("alice", "main");
    store.insert_session(session.clone()).unwrap();
    let router = EventRouter::new(
        Arc::clone(&store),
        Some(Outbox::new(Arc::clone(&store))),
    );
    (store, session, router)
}

async fn session_of(store: &MemoryStore, id: &str) -> Session {
    store.get_by_id(id).await.unwrap().unwrap()
}

/// Polls `cond` until it holds or one second passes.
async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

mod route {
    use super::*;

    #[tokio::test]
    async fn connected_enqueues_and_projects_identity() {
        let (store, session, router) = setup();

        router
            .route(
                &session.key(),
                ProtocolEvent::Connected {
                    identity: "123@s".to_string(),
                },
            )
            .await;

        let events = store.events();
        assert_eq!(events.len(), 1);
        let row = &events[0];
        assert_eq!(row.owner, "alice");
        assert_eq!(row.session_ref(), Some(session.id.as_str()));
        assert_eq!(row.event_type, "Connected");
        assert_eq!(row.payload, json!({"jid": "123@s"}));
        assert_eq!((row.status, row.attempts), (EventStatus::Pending, 0));

        let updated = session_of(&store, &session.id).await;
        assert!(updated.connected);
        assert_eq!(updated.identity, "123@s");
    }

    #[tokio::test]
    async fn connected_without_identity_keeps_stored_identity() {
        let (store, session, router) = setup();
        store.update_identity(&session.id, "old@s").await.unwrap();

        router
            .route(
                &session.key(),
                ProtocolEvent::Connected {
                    identity: String::new(),
                },
            )
            .await;

        let updated = session_of(&store, &session.id).await;
        assert!(updated.connected);
        assert_eq!(updated.identity, "old@s");
    }

    #[tokio::test]
    async fn disconnect_and_logout_clear_connected_flag() {
        let (store, session, router) = setup();
        store.update_connected(&session.id, true).await.unwrap();

        router
            .route(&session.key(), ProtocolEvent::Disconnected)
            .await;
        assert!(!session_of(&store, &session.id).await.connected);

        store.update_connected(&session.id, true).await.unwrap();
        router
            .route(
                &session.key(),
                ProtocolEvent::LoggedOut {
                    reason: "revoked".to_string(),
                },
            )
            .await;
        assert!(!session_of(&store, &session.id).await.connected);

        let kinds: Vec<_> = store.events().into_iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, ["Disconnected", "LoggedOut"]);
    }

    #[tokio::test]
    async fn qr_event_stores_pairing_code() {
        let (store, session, router) = setup();

        router
            .route(
                &session.key(),
                ProtocolEvent::Qr {
                    code: "2@abc".to_string(),
                },
            )
            .await;

        assert_eq!(session_of(&store, &session.id).await.qr_code, "2@abc");
        assert_eq!(store.events()[0].event_type, "QR");
    }

    #[tokio::test]
    async fn data_event_only_enqueues() {
        let (store, session, router) = setup();
        let before = session_of(&store, &session.id).await;

        router
            .route(&session.key(), ProtocolEvent::Message(json!({"text": "hi"})))
            .await;

        assert_eq!(session_of(&store, &session.id).await, before);
        assert_eq!(store.events()[0].payload, json!({"text": "hi"}));
    }

    #[tokio::test]
    async fn without_outbox_only_projects() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new("alice", "main");
        store.insert_session(session.clone()).unwrap();
        let router: Router = EventRouter::new(Arc::clone(&store), None);

        router
            .route(
                &session.key(),
                ProtocolEvent::Connected {
                    identity: "123@s".to_string(),
                },
            )
            .await;

        assert!(store.events().is_empty());
        assert!(session_of(&store, &session.id).await.connected);
    }

    #[tokio::test]
    async fn unknown_session_still_enqueues() {
        let (store, _, router) = setup();
        let key = crate::session::SessionKey::new("alice", "gone");

        router.route(&key, ProtocolEvent::Disconnected).await;

        assert_eq!(store.events().len(), 1);
    }
}

/// Outbox store whose writes always fail.
struct BrokenOutbox;

impl OutboxStore for BrokenOutbox {
    async fn insert_pending(
        &self,
        _owner: &str,
        _session_id: Option<&str>,
        _event_type: &str,
        _payload: Value,
    ) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("down".to_string()))
    }

    async fn fetch_pending_batch(&self, _limit: usize) -> Result<Vec<WebhookEvent>, StoreError> {
        Ok(Vec::new())
    }

    async fn mark_sent(&self, id: i64) -> Result<(), StoreError> {
        Err(StoreError::EventNotFound(id))
    }

    async fn mark_failed(&self, id: i64) -> Result<(), StoreError> {
        Err(StoreError::EventNotFound(id))
    }

    async fn record_failure(&self, id: i64) -> Result<EventStatus, StoreError> {
        Err(StoreError::EventNotFound(id))
    }

    async fn purge_terminal_before(&self, _cutoff: SystemTime) -> Result<usize, StoreError> {
        Ok(0)
    }
}

#[tokio::test]
async fn failing_outbox_does_not_block_projection() {
    let store = Arc::new(MemoryStore::new());
    let session = Session::new("alice", "main");
    store.insert_session(session.clone()).unwrap();
    let router = EventRouter::new(Arc::clone(&store), Some(Outbox::new(Arc::new(BrokenOutbox))));

    router
        .route(
            &session.key(),
            ProtocolEvent::Connected {
                identity: "123@s".to_string(),
            },
        )
        .await;

    let updated = session_of(&store, &session.id).await;
    assert!(updated.connected);
    assert_eq!(updated.identity, "123@s");
}

mod worker {
    use super::*;

    #[tokio::test]
    async fn sink_events_reach_the_stores() {
        let (store, session, router) = setup();
        let (bus, _task) = router.spawn(16);
        let sink = bus.sink(session.key());

        sink.emit(ProtocolEvent::Connected {
            identity: "123@s".to_string(),
        });
        sink.emit(ProtocolEvent::Message(json!({"n": 1})));

        eventually(|| store.events().len() == 2).await;
        assert!(session_of(&store, &session.id).await.connected);
        assert_eq!(sink.key(), &session.key());
    }

    #[tokio::test]
    async fn full_queue_loses_nothing() {
        let (store, session, router) = setup();
        let (bus, _task) = router.spawn(1);
        let sink = bus.sink(session.key());

        for n in 0..25 {
            sink.emit(ProtocolEvent::Message(json!({"n": n})));
        }

        eventually(|| store.events().len() == 25).await;
    }

    #[tokio::test]
    async fn concurrent_sessions_are_all_routed() {
        let (store, _, router) = setup();
        let (bus, _task) = router.spawn(8);

        let emitters: Vec<_> = (0..4)
            .map(|i| {
                let sink = bus.sink(crate::session::SessionKey::new("alice", format!("s{i}")));
                tokio::spawn(async move {
                    for n in 0..10 {
                        sink.emit(ProtocolEvent::Presence(json!({"n": n})));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for emitter in emitters {
            emitter.await.unwrap();
        }

        eventually(|| store.events().len() == 40).await;
    }

    #[tokio::test]
    async fn worker_exits_when_all_senders_drop() {
        let (_, session, router) = setup();
        let (bus, task) = router.spawn(4);
        let sink = bus.sink(session.key());

        drop(bus);
        drop(sink);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn emit_after_stop_is_dropped() {
        let (store, session, router) = setup();
        let (bus, task) = router.spawn(4);
        let sink = bus.sink(session.key());

        task.abort();
        let _ = task.await;
        assert!(bus.is_closed());

        sink.emit(ProtocolEvent::Disconnected);
        tokio::task::yield_now().await;

        assert!(store.events().is_empty());
    }
}
