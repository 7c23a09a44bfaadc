//! An in-memory key/value store for exercising [`SharedCache`].
//!
//! [`SharedCache`]: sheetorm_core::cache::SharedCache

use parking_lot::Mutex;
use sheetorm_core::cache::{KeyValueStore, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A key/value store honoring expiry, which can be switched into a failing
/// state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, (_, expires))| expires.map_or(true, |at| at > now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Stores a raw value, bypassing failure injection.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), (value.to_string(), None));
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, Some(at))) if *at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.check()?;
        let expires = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let store = MemoryStore::new();
        store.set("a", "1", None).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.delete("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn entries_expire() {
        let store = MemoryStore::new();
        store.set("a", "1", Some(Duration::ZERO)).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn failing_store() {
        let store = MemoryStore::new();
        store.insert_raw("a", "1");
        store.set_failing(true);
        assert!(store.get("a").is_err());

        store.set_failing(false);
        assert_eq!(store.keys(), vec!["a".to_string()]);
    }
}
