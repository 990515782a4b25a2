use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One mutual-exclusion primitive per key, created on demand and shared by
/// every caller holding a reference to the same registry.
///
/// Release is structural: the guard returned by [`acquire`](Self::acquire)
/// unlocks when dropped, so no call site can forget to release.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block the calling task until the lock for `key` is held.
    ///
    /// Lookup-and-create is atomic: concurrent first-time callers for the
    /// same key share one mutex instance.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let handle = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        handle.lock_owned().await
    }

    /// Drop the registry entry for `key` so future accesses start fresh.
    ///
    /// This is a reuse reset, not a safety mechanism: a guard already held
    /// elsewhere keeps its mutex alive through its own `Arc`, unaffected by
    /// the entry's removal.
    pub async fn forget(&self, key: &str) {
        self.locks.lock().await.remove(key);
    }
}
