//! In-process caches with per-entry expiry.

use super::{RowCache, RowData, UidCache};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Size at which inserts first sweep expired entries.
const MIN_SWEEP: usize = 64;

#[derive(Debug)]
struct ExpiringMap<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Option<Duration>,
    sweep_at: AtomicUsize,
}

impl<K: Eq + Hash, V: Clone> ExpiringMap<K, V> {
    fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            sweep_at: AtomicUsize::new(MIN_SWEEP),
        }
    }

    /// Inserts an entry. Once the map doubles past its last swept size,
    /// expired entries are dropped so keys never read again do not pile up.
    fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let expires_at = self.ttl.and_then(|ttl| now.checked_add(ttl));
        let mut entries = self.entries.write();
        entries.insert(key, Entry { value, expires_at });

        if self.ttl.is_some() && entries.len() >= self.sweep_at.load(Ordering::Relaxed) {
            entries.retain(|_, entry| !entry.is_expired(now));
            let next = entries.len().saturating_mul(2).max(MIN_SWEEP);
            self.sweep_at.store(next, Ordering::Relaxed);
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // expired, drop it unless it was refreshed in between
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        None
    }

    fn remove(&self, key: &K) {
        self.entries.write().remove(key);
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

/// UID cache backed by a process-local map.
///
/// Resolution caches every UID it sees, including UIDs of records that are
/// later deleted from the sheet. Entries therefore expire after
/// [`Self::DEFAULT_TTL`] unless another TTL is chosen, and expired entries are
/// swept as the map grows. [`Self::unbounded`] keeps entries until they are
/// invalidated.
#[derive(Debug)]
pub struct MemoryUidCache {
    inner: ExpiringMap<String, usize>,
}

impl MemoryUidCache {
    /// Default expiry of UID entries.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

    /// Creates a cache whose entries expire after [`Self::DEFAULT_TTL`].
    pub fn new() -> Self {
        Self::with_ttl(Self::DEFAULT_TTL)
    }

    /// Creates a cache whose entries never expire. It grows with every UID
    /// ever resolved.
    pub fn unbounded() -> Self {
        Self {
            inner: ExpiringMap::new(None),
        }
    }

    /// Creates a cache whose entries expire `ttl` after they were stored.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: ExpiringMap::new(Some(ttl)),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl Default for MemoryUidCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UidCache for MemoryUidCache {
    fn put_uid(&self, uid: &str, row: usize) {
        self.inner.insert(uid.to_string(), row);
    }

    fn get_row_num(&self, uid: &str) -> Option<usize> {
        self.inner.get(&uid.to_string())
    }

    fn invalidate_uid(&self, uid: &str) {
        self.inner.remove(&uid.to_string());
    }
}

/// Row cache backed by a process-local map.
///
/// Entries always expire; rows served from here skip the sheet entirely.
#[derive(Debug)]
pub struct MemoryRowCache {
    inner: ExpiringMap<usize, RowData>,
}

impl MemoryRowCache {
    /// Default forget horizon.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

    /// Creates a cache whose entries expire `ttl` after they were stored.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: ExpiringMap::new(Some(ttl)),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl Default for MemoryRowCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

impl RowCache for MemoryRowCache {
    fn put_row(&self, row: usize, data: &RowData) {
        self.inner.insert(row, data.clone());
    }

    fn get_row(&self, row: usize) -> Option<RowData> {
        self.inner.get(&row)
    }

    fn invalidate_row(&self, row: usize) {
        self.inner.remove(&row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn row(uid: &str) -> RowData {
        RowData::from([("A".to_string(), uid.to_string()), ("B".to_string(), "x".to_string())])
    }

    #[test]
    fn uid_cache_put_get_invalidate() {
        let cache = MemoryUidCache::new();
        assert_eq!(cache.get_row_num("a"), None);

        cache.put_uid("a", 4);
        cache.put_uid("b", 7);
        assert_eq!(cache.get_row_num("a"), Some(4));
        assert_eq!(cache.get_row_num("b"), Some(7));

        cache.put_uid("a", 5);
        assert_eq!(cache.get_row_num("a"), Some(5));

        cache.invalidate_uid("a");
        assert_eq!(cache.get_row_num("a"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn row_cache_put_get_invalidate() {
        let cache = MemoryRowCache::default();
        cache.put_row(3, &row("a"));
        assert_eq!(cache.get_row(3), Some(row("a")));
        assert_eq!(cache.get_row(4), None);

        cache.invalidate_row(3);
        assert_eq!(cache.get_row(3), None);
    }

    #[test]
    fn expired_entries_are_misses() {
        let uids = MemoryUidCache::with_ttl(Duration::from_millis(10));
        let rows = MemoryRowCache::new(Duration::from_millis(10));
        uids.put_uid("a", 1);
        rows.put_row(1, &row("a"));

        thread::sleep(Duration::from_millis(30));

        assert_eq!(uids.get_row_num("a"), None);
        assert_eq!(rows.get_row(1), None);
        assert!(uids.is_empty());
        assert!(rows.is_empty());
    }

    #[test]
    fn inserts_sweep_expired_entries() {
        let cache = MemoryUidCache::with_ttl(Duration::ZERO);
        for i in 0..100 {
            cache.put_uid(&format!("gone-{i}"), i + 1);
        }
        assert!(cache.len() < 100);

        let live = MemoryUidCache::new();
        for i in 0..100 {
            live.put_uid(&format!("kept-{i}"), i + 1);
        }
        assert_eq!(live.len(), 100);
        assert_eq!(live.get_row_num("kept-0"), Some(1));
    }

    #[test]
    fn unbounded_cache_keeps_everything() {
        let cache = MemoryUidCache::unbounded();
        for i in 0..100 {
            cache.put_uid(&format!("u{i}"), i + 1);
        }
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn concurrent_access() {
        let cache = Arc::new(MemoryUidCache::new());
        let mut handles = Vec::new();

        for t in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..250 {
                    let uid = format!("{t}-{i}");
                    cache.put_uid(&uid, i + 1);
                    assert_eq!(cache.get_row_num(&uid), Some(i + 1));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 1000);
    }
}
