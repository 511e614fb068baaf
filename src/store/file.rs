//! File-backed store with atomic snapshot writes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::outbox::{EventStatus, WebhookEvent};
use crate::session::{Session, Subscriptions};
use crate::time::{Clock, SystemClock, unix_seconds};

use super::tables::Tables;
use super::{OutboxStore, SessionStore, StoreError};

/// Current store file format version.
///
/// Increment this when making breaking changes to the format.
const STORE_FILE_VERSION: u32 = 1;

/// On-disk format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    version: u32,
    tables: Tables,
}

/// Borrowed view of [`StoreFile`] for writing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot<'a> {
    version: u32,
    /// Unix seconds at write time, for debugging only.
    saved_at: i64,
    tables: &'a Tables,
}

/// Result of reading the store file at startup.
#[derive(Debug)]
pub(crate) enum LoadResult {
    /// The file was read and parsed.
    Loaded(Tables),
    /// No file exists yet.
    NotFound,
    /// The file exists but could not be read or parsed.
    Corrupted {
        /// Reason for corruption.
        reason: String,
    },
}

/// Durable implementation of [`SessionStore`] and [`OutboxStore`].
///
/// Keeps all rows in memory and rewrites a JSON snapshot after every
/// mutation. Writes go to `{path}.tmp` and are renamed over `{path}`, so the
/// file is either fully written or not written at all. A mutation only
/// becomes visible once its snapshot has been written.
#[derive(Debug)]
pub struct FileStore<C = SystemClock> {
    path: PathBuf,
    tables: Mutex<Tables>,
    clock: C,
}

impl FileStore<SystemClock> {
    /// Opens the store at `path` using the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the file exists but is unreadable.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_clock(path, SystemClock).await
    }
}

impl<C: Clock> FileStore<C> {
    /// Opens the store at `path` with a custom clock.
    ///
    /// A missing file yields an empty store; the file is created on the first
    /// mutation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if the file exists but is unreadable.
    pub async fn open_with_clock(path: impl Into<PathBuf>, clock: C) -> Result<Self, StoreError> {
        let path = path.into();
        let load_path = path.clone();
        let loaded = tokio::task::spawn_blocking(move || load(&load_path))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let tables = match loaded {
            LoadResult::Loaded(tables) => tables,
            LoadResult::NotFound => {
                tracing::info!(path = %path.display(), "Store file not found, starting empty");
                Tables::default()
            }
            LoadResult::Corrupted { reason } => {
                return Err(StoreError::Corrupted { path, reason });
            }
        };

        Ok(Self {
            path,
            tables: Mutex::new(tables),
            clock,
        })
    }

    /// Returns the path to the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` to a copy of the tables, persists it, then publishes it.
    async fn update<T: Send>(
        &self,
        change: impl FnOnce(&mut Tables, SystemTime) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let out = change(&mut next, self.clock.now())?;
        self.persist(&next).await?;
        *tables = next;
        Ok(out)
    }

    async fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        let file = StoreSnapshot {
            version: STORE_FILE_VERSION,
            saved_at: unix_seconds(SystemTime::now()),
            tables,
        };
        let content = serde_json::to_vec_pretty(&file).map_err(StoreError::Serialize)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || save_blocking(&path, &content))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }

    /// Inserts or replaces a session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateSession`] on a name clash, or a write error.
    pub async fn insert_session(&self, session: Session) -> Result<(), StoreError> {
        self.update(move |t, _| t.insert_session(session)).await
    }

    /// Removes a session, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns a write error if the snapshot cannot be saved.
    pub async fn remove_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        self.update(|t, _| Ok(t.remove_session(id))).await
    }

    /// Returns a copy of one outbox row.
    pub async fn event(&self, id: i64) -> Option<WebhookEvent> {
        self.tables.lock().await.event(id)
    }

    /// Returns a copy of every outbox row, ordered by id.
    pub async fn events(&self) -> Vec<WebhookEvent> {
        self.tables.lock().await.events()
    }
}

fn load(path: &Path) -> LoadResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return LoadResult::NotFound,
        Err(e) => {
            return LoadResult::Corrupted {
                reason: format!("Failed to read file: {e}"),
            };
        }
    };

    match serde_json::from_str::<StoreFile>(&content) {
        Ok(file) if file.version == STORE_FILE_VERSION => LoadResult::Loaded(file.tables),
        Ok(file) => LoadResult::Corrupted {
            reason: format!(
                "Incompatible version: expected {STORE_FILE_VERSION}, got {}",
                file.version
            ),
        },
        Err(e) => LoadResult::Corrupted {
            reason: format!("Invalid JSON: {e}"),
        },
    }
}

fn save_blocking(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StoreError::Write)?;
        }
    }

    // store.json -> store.json.tmp, not store.tmp
    let temp_path = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&temp_path, content).map_err(StoreError::Write)?;
    std::fs::rename(&temp_path, path).map_err(StoreError::Write)?;

    Ok(())
}

impl<C: Clock + 'static> SessionStore for FileStore<C> {
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.tables.lock().await.session(id))
    }

    async fn get_by_owner_and_name(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self.tables.lock().await.session_by_owner_and_name(owner, name))
    }

    async fn list_connected(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.tables.lock().await.connected_sessions())
    }

    async fn update_connected(&self, id: &str, connected: bool) -> Result<(), StoreError> {
        self.update(|t, _| t.set_connected(id, connected)).await
    }

    async fn update_identity(&self, id: &str, identity: &str) -> Result<(), StoreError> {
        self.update(|t, _| t.set_identity(id, identity)).await
    }

    async fn update_qr_code(&self, id: &str, code: &str) -> Result<(), StoreError> {
        self.update(|t, _| t.set_qr_code(id, code)).await
    }

    async fn update_webhook_config(
        &self,
        id: &str,
        url: &str,
        events: &Subscriptions,
    ) -> Result<(), StoreError> {
        self.update(|t, _| t.set_webhook_config(id, url, events))
            .await
    }
}

impl<C: Clock + 'static> OutboxStore for FileStore<C> {
    async fn insert_pending(
        &self,
        owner: &str,
        session_id: Option<&str>,
        event_type: &str,
        payload: Value,
    ) -> Result<i64, StoreError> {
        self.update(move |t, now| Ok(t.insert_event(owner, session_id, event_type, payload, now)))
            .await
    }

    async fn fetch_pending_batch(&self, limit: usize) -> Result<Vec<WebhookEvent>, StoreError> {
        Ok(self.tables.lock().await.pending_batch(limit))
    }

    async fn mark_sent(&self, id: i64) -> Result<(), StoreError> {
        self.update(|t, now| t.mark_sent(id, now)).await
    }

    async fn mark_failed(&self, id: i64) -> Result<(), StoreError> {
        self.update(|t, now| t.mark_failed(id, now)).await
    }

    async fn record_failure(&self, id: i64) -> Result<EventStatus, StoreError> {
        self.update(|t, now| t.record_failure(id, now)).await
    }

    async fn purge_terminal_before(&self, cutoff: SystemTime) -> Result<usize, StoreError> {
        self.update(|t, _| Ok(t.purge_terminal_before(cutoff))).await
    }
}
