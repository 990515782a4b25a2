use async_trait::async_trait;

use crate::error::StoreError;

/// Typed key-value persistence contract over a file-per-key datastore.
///
/// Implementations serialize all access to one key behind that key's lock, so
/// every method here is a complete acquire-work-release cycle.
#[async_trait]
pub trait KvRepository<T>: Send + Sync {
    /// Replace the value and ttl stored under `key`.
    async fn set(&self, key: &str, value: Option<T>, ttl_seconds: i64) -> Result<(), StoreError>;

    /// Read-modify-write: run `apply` against the current value while the
    /// key's lock is held, then persist with the given ttl. An error from
    /// `apply` aborts the write and propagates.
    async fn update<F>(&self, key: &str, ttl_seconds: i64, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Option<T>) -> Result<(), StoreError> + Send + 'static;

    /// Refresh the ttl (and modification stamp) without touching the value.
    async fn touch(&self, key: &str, ttl_seconds: i64) -> Result<(), StoreError>;

    /// Remove the key's file. Not idempotent: deleting an absent key is an
    /// io error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Current value for `key`; `None` if never set or expired.
    async fn get(&self, key: &str) -> Result<Option<T>, StoreError>;

    /// Values of every live record in the namespace.
    async fn get_all(&self) -> Result<Vec<Option<T>>, StoreError>;

    /// Keys of every live record in the namespace. Expired records are
    /// purged, not reported.
    async fn get_all_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Whether a file exists for `key`. Does not create one and does not
    /// trigger expiry.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Unix seconds of the last save for `key`; zero if never saved.
    async fn last_modified_seconds(&self, key: &str) -> Result<i64, StoreError>;
}
