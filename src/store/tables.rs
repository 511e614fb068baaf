//! In-memory tables shared by the store implementations.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::outbox::{EventStatus, WebhookEvent};
use crate::session::{Session, Subscriptions};

use super::StoreError;

/// Sessions and outbox rows, keyed by id.
///
/// All mutations are synchronous; the wrapping store decides how access is
/// serialized and whether changes are persisted.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Tables {
    #[serde(default)]
    sessions: BTreeMap<String, Session>,
    #[serde(default)]
    events: BTreeMap<i64, WebhookEvent>,
    #[serde(default)]
    last_event_id: i64,
}

impl Tables {
    pub(crate) fn insert_session(&mut self, session: Session) -> Result<(), StoreError> {
        let duplicate = self
            .sessions
            .values()
            .any(|s| s.owner == session.owner && s.name == session.name && s.id != session.id);
        if duplicate {
            return Err(StoreError::DuplicateSession {
                owner: session.owner,
                name: session.name,
            });
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub(crate) fn remove_session(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub(crate) fn session(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).cloned()
    }

    pub(crate) fn session_by_owner_and_name(&self, owner: &str, name: &str) -> Option<Session> {
        self.sessions
            .values()
            .find(|s| s.owner == owner && s.name == name)
            .cloned()
    }

    pub(crate) fn connected_sessions(&self) -> Vec<Session> {
        self.sessions
            .values()
            .filter(|s| s.connected)
            .cloned()
            .collect()
    }

    fn session_mut(&mut self, id: &str) -> Result<&mut Session, StoreError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    pub(crate) fn set_connected(&mut self, id: &str, connected: bool) -> Result<(), StoreError> {
        self.session_mut(id)?.connected = connected;
        Ok(())
    }

    pub(crate) fn set_identity(&mut self, id: &str, identity: &str) -> Result<(), StoreError> {
        self.session_mut(id)?.identity = identity.to_string();
        Ok(())
    }

    pub(crate) fn set_qr_code(&mut self, id: &str, code: &str) -> Result<(), StoreError> {
        self.session_mut(id)?.qr_code = code.to_string();
        Ok(())
    }

    pub(crate) fn set_webhook_config(
        &mut self,
        id: &str,
        url: &str,
        events: &Subscriptions,
    ) -> Result<(), StoreError> {
        let session = self.session_mut(id)?;
        session.webhook_url = url.to_string();
        session.events = events.clone();
        Ok(())
    }

    pub(crate) fn insert_event(
        &mut self,
        owner: &str,
        session_id: Option<&str>,
        event_type: &str,
        payload: Value,
        now: SystemTime,
    ) -> i64 {
        self.last_event_id += 1;
        let id = self.last_event_id;
        let event = WebhookEvent::pending(
            id,
            owner,
            session_id.map(ToString::to_string),
            event_type,
            payload,
            now,
        );
        self.events.insert(id, event);
        id
    }

    pub(crate) fn event(&self, id: i64) -> Option<WebhookEvent> {
        self.events.get(&id).cloned()
    }

    pub(crate) fn events(&self) -> Vec<WebhookEvent> {
        self.events.values().cloned().collect()
    }

    /// Oldest due rows first; ids break ties between equal timestamps.
    pub(crate) fn pending_batch(&self, limit: usize) -> Vec<WebhookEvent> {
        let mut due: Vec<&WebhookEvent> = self.events.values().filter(|e| e.is_due()).collect();
        due.sort_by_key(|e| (e.created_at, e.id));
        due.into_iter().take(limit).cloned().collect()
    }

    fn event_mut(&mut self, id: i64) -> Result<&mut WebhookEvent, StoreError> {
        self.events
            .get_mut(&id)
            .ok_or(StoreError::EventNotFound(id))
    }

    pub(crate) fn mark_sent(&mut self, id: i64, now: SystemTime) -> Result<(), StoreError> {
        self.event_mut(id)?.mark_sent(now);
        Ok(())
    }

    pub(crate) fn mark_failed(&mut self, id: i64, now: SystemTime) -> Result<(), StoreError> {
        self.event_mut(id)?.mark_failed(now);
        Ok(())
    }

    pub(crate) fn record_failure(
        &mut self,
        id: i64,
        now: SystemTime,
    ) -> Result<EventStatus, StoreError> {
        Ok(self.event_mut(id)?.record_failure(now))
    }

    pub(crate) fn purge_terminal_before(&mut self, cutoff: SystemTime) -> usize {
        let before = self.events.len();
        self.events
            .retain(|_, e| !(e.status.is_terminal() && e.created_at < cutoff));
        before - self.events.len()
    }
}
