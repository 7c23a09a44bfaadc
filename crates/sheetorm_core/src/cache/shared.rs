//! Caches over a shared, fallible key/value store.

use super::{RowCache, RowData, UidCache};
use std::time::Duration;
use thiserror::Error;

/// An error reported by a [`KeyValueStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cache store error: {0}")]
pub struct StoreError(pub String);

/// A shared string key/value store, such as a distributed cache.
///
/// Implementations are expected to enforce `ttl` themselves.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value of `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, expiring after `ttl` if given.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Deletes `key`.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Both cache tiers over one [`KeyValueStore`].
///
/// Row numbers are stored as decimal strings and rows as JSON objects. Every
/// store failure is logged and treated as a miss.
#[derive(Debug)]
pub struct SharedCache<S: KeyValueStore> {
    store: S,
    prefix: String,
    uid_ttl: Option<Duration>,
    row_ttl: Duration,
}

impl<S: KeyValueStore> SharedCache<S> {
    /// Default forget horizon of cached rows.
    pub const DEFAULT_ROW_TTL: Duration = Duration::from_secs(10);

    /// Creates a cache storing keys under `prefix`.
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            uid_ttl: None,
            row_ttl: Self::DEFAULT_ROW_TTL,
        }
    }

    /// Sets the expiry of UID entries.
    pub fn with_uid_ttl(mut self, ttl: Duration) -> Self {
        self.uid_ttl = Some(ttl);
        self
    }

    /// Sets the expiry of row entries.
    pub fn with_row_ttl(mut self, ttl: Duration) -> Self {
        self.row_ttl = ttl;
        self
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn uid_key(&self, uid: &str) -> String {
        format!("{}uid:{}", self.prefix, uid)
    }

    fn row_key(&self, row: usize) -> String {
        format!("{}row:{}", self.prefix, row)
    }

    fn get_or_miss(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    fn set_or_warn(&self, key: &str, value: &str, ttl: Option<Duration>) {
        if let Err(err) = self.store.set(key, value, ttl) {
            tracing::warn!(key, error = %err, "failed to store cache entry");
        }
    }

    fn delete_or_warn(&self, key: &str) {
        if let Err(err) = self.store.delete(key) {
            tracing::warn!(key, error = %err, "failed to invalidate cache entry");
        }
    }
}

impl<S: KeyValueStore> UidCache for SharedCache<S> {
    fn put_uid(&self, uid: &str, row: usize) {
        self.set_or_warn(&self.uid_key(uid), &row.to_string(), self.uid_ttl);
    }

    fn get_row_num(&self, uid: &str) -> Option<usize> {
        let key = self.uid_key(uid);
        let raw = self.get_or_miss(&key)?;
        match raw.parse::<usize>() {
            Ok(row) if row > 0 => Some(row),
            _ => {
                tracing::warn!(key = %key, value = %raw, "cached row number is garbage, dropping it");
                self.delete_or_warn(&key);
                None
            }
        }
    }

    fn invalidate_uid(&self, uid: &str) {
        self.delete_or_warn(&self.uid_key(uid));
    }
}

impl<S: KeyValueStore> RowCache for SharedCache<S> {
    fn put_row(&self, row: usize, data: &RowData) {
        let key = self.row_key(row);
        match serde_json::to_string(data) {
            Ok(json) => self.set_or_warn(&key, &json, Some(self.row_ttl)),
            Err(err) => tracing::warn!(key = %key, error = %err, "failed to encode row for cache"),
        }
    }

    fn get_row(&self, row: usize) -> Option<RowData> {
        let key = self.row_key(row);
        let raw = self.get_or_miss(&key)?;
        match serde_json::from_str::<RowData>(&raw) {
            Ok(data) => Some(data),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cached row is garbage, dropping it");
                self.delete_or_warn(&key);
                None
            }
        }
    }

    fn invalidate_row(&self, row: usize) {
        self.delete_or_warn(&self.row_key(row));
    }
}
