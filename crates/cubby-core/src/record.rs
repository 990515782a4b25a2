use serde::{Deserialize, Serialize};

/// The value-plus-metadata unit stored for one key.
///
/// Field names are wire-stable: files written by other implementations of the
/// same format must stay readable, so they are never renamed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Record<T> {
    /// Key name; mirrors the file's base name and is refilled on every load,
    /// so the stored copy is informational only.
    #[serde(default)]
    pub key: String,
    /// Payload; `None` means the key has never been assigned a value, which
    /// is distinct from any zero value of `T`.
    #[serde(default)]
    pub value: Option<T>,
    /// Seconds after the last save before the record expires. Zero or
    /// negative means it never expires.
    #[serde(default)]
    pub ttl_seconds: i64,
    /// Unix seconds of the last successful save; zero before any save.
    /// Stamped by the save path, never by callers.
    #[serde(default)]
    pub modified_at_seconds: i64,
}

impl<T> Record<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Whether the record's ttl has elapsed relative to `now_seconds`.
    pub fn is_expired(&self, now_seconds: i64) -> bool {
        self.ttl_seconds > 0 && self.modified_at_seconds + self.ttl_seconds < now_seconds
    }
}

impl<T> Default for Record<T> {
    fn default() -> Self {
        Self {
            key: String::new(),
            value: None,
            ttl_seconds: 0,
            modified_at_seconds: 0,
        }
    }
}
