//! Handle table with per-key locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::{Mutex as KeyLock, OwnedMutexGuard};

use crate::session::SessionKey;

/// Live handles plus one async lock per key.
///
/// Both maps sit behind short-lived std locks that are never held across an
/// await. The per-key async lock is what serializes connect, disconnect and
/// logout for one session.
pub(super) struct HandleTable<C> {
    handles: RwLock<HashMap<SessionKey, Arc<C>>>,
    locks: Mutex<HashMap<SessionKey, Arc<KeyLock<()>>>>,
}

impl<C> HandleTable<C> {
    pub(super) fn new() -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub(super) fn get(&self, key: &SessionKey) -> Option<Arc<C>> {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub(super) fn insert(&self, key: SessionKey, client: Arc<C>) -> Option<Arc<C>> {
        self.handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, client)
    }

    pub(super) fn remove(&self, key: &SessionKey) -> Option<Arc<C>> {
        self.handles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub(super) fn len(&self) -> usize {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits for exclusive access to `key`.
    ///
    /// The lock entry is pruned when the returned guard drops and no other
    /// task holds or awaits it.
    pub(super) async fn lock(&self, key: &SessionKey) -> KeyGuard<'_, C> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        KeyGuard {
            table: self,
            key: key.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    fn release(&self, key: &SessionKey) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    pub(super) fn lock_entries(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Exclusive access to one key of a [`HandleTable`].
pub(super) struct KeyGuard<'a, C> {
    table: &'a HandleTable<C>,
    key: SessionKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<C> Drop for KeyGuard<'_, C> {
    fn drop(&mut self) {
        // Unlock first so our own reference does not keep the entry alive.
        drop(self.guard.take());
        self.table.release(&self.key);
    }
}
