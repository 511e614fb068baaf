//! Scriptable protocol client and factory for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::protocol::{ClientFactory, ProtocolClient, ProtocolError, ProtocolEvent};
use crate::router::EventSink;
use crate::session::Session;

/// A fake client that reports through its sink like a real one would.
#[derive(Debug)]
pub struct MockClient {
    sink: EventSink,
    identity: String,
    connected: AtomicBool,
    logged_in: AtomicBool,
    fail_connect: bool,
    fail_logout: bool,
    connect_delay: Option<Duration>,
    disconnects: Arc<AtomicUsize>,
}

impl MockClient {
    /// Forces the connected flag, as if the transport dropped.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Emits an arbitrary event through the client's sink.
    pub fn emit(&self, event: ProtocolEvent) {
        self.sink.emit(event);
    }
}

impl ProtocolClient for MockClient {
    async fn connect(&self) -> Result<(), ProtocolError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_connect {
            return Err(ProtocolError::Connect("connection refused".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        if self.logged_in.load(Ordering::SeqCst) {
            self.sink.emit(ProtocolEvent::Connected {
                identity: self.identity.clone(),
            });
        } else {
            self.sink.emit(ProtocolEvent::Qr {
                code: "2@pairing".to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.sink.emit(ProtocolEvent::Disconnected);
    }

    async fn logout(&self) -> Result<(), ProtocolError> {
        if self.fail_logout {
            return Err(ProtocolError::Logout("rejected".to_string()));
        }
        self.logged_in.store(false, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.sink.emit(ProtocolEvent::LoggedOut {
            reason: "logout".to_string(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    fn identity(&self) -> Option<String> {
        self.is_logged_in().then(|| self.identity.clone())
    }
}

/// Builds [`MockClient`]s; paired clients get identity `<name>@s`.
#[derive(Debug, Default)]
pub struct MockFactory {
    unpaired: bool,
    fail_logout: bool,
    connect_delay: Option<Duration>,
    failing: Mutex<HashSet<String>>,
    created: AtomicUsize,
    disconnects: Arc<AtomicUsize>,
}

impl MockFactory {
    /// Clients start paired and connect successfully.
    pub fn paired() -> Self {
        Self::default()
    }

    /// Clients start unpaired and emit a pairing code on connect.
    pub fn unpaired() -> Self {
        Self {
            unpaired: true,
            ..Self::default()
        }
    }

    /// Every connect sleeps for `delay` first.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Remote logout is rejected.
    pub fn with_failing_logout(mut self) -> Self {
        self.fail_logout = true;
        self
    }

    /// Clients for `session_id` fail to connect.
    pub fn fail_session(&self, session_id: &str) {
        self.failing.lock().unwrap().insert(session_id.to_string());
    }

    /// Clients created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Disconnect calls across every client.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl ClientFactory for Arc<MockFactory> {
    type Client = MockClient;

    async fn create(&self, session: &Session, sink: EventSink) -> Result<MockClient, ProtocolError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockClient {
            sink,
            identity: format!("{}@s", session.name),
            connected: AtomicBool::new(false),
            logged_in: AtomicBool::new(!self.unpaired),
            fail_connect: self.failing.lock().unwrap().contains(&session.id),
            fail_logout: self.fail_logout,
            connect_delay: self.connect_delay,
            disconnects: Arc::clone(&self.disconnects),
        })
    }
}
