//! # Cache Entry Store
//!
//! Keyed storage of fetched results with expiration. Each entry is stored
//! as a JSON envelope `{ "data", "timestamp", "ttl" }` under
//! `namespace + key`. Expired entries are treated as absent and removed the
//! next time they are read.
//!
//! The `try_*` methods surface backend errors. The plain methods log them and
//! degrade to miss behaviour, so a failing backend never breaks a caller that
//! already has fresh data in hand.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::key;
use crate::clock::SharedClock;
use crate::error::Result;
use crate::storage::SharedStorage;

/// Stored envelope
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    /// Creation time, epoch milliseconds
    timestamp: i64,
    /// Lifetime in milliseconds
    ttl: u64,
}

/// Envelope without the payload, for sweeps
#[derive(Debug, Deserialize)]
struct EntryMeta {
    timestamp: i64,
    ttl: u64,
}

fn is_expired(timestamp: i64, ttl: u64, now: i64) -> bool {
    let age = now.saturating_sub(timestamp);
    age >= i64::try_from(ttl).unwrap_or(i64::MAX)
}

/// Entry counts for one namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub live: usize,
    pub expired: usize,
    /// Entries that could not be decoded
    pub corrupt: usize,
}

/// TTL cache over a storage backend
#[derive(Clone)]
pub struct CacheStore {
    storage: SharedStorage,
    clock: SharedClock,
    namespace: String,
}

impl CacheStore {
    pub fn new(storage: SharedStorage, clock: SharedClock, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            clock,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn physical_key(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }

    /// Logical keys of every entry in this namespace
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .storage
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.namespace).map(str::to_string))
            .collect())
    }

    // =========================================================================
    // READ / WRITE
    // =========================================================================

    /// Store `data` under `key`, replacing any existing entry
    pub fn try_set<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now_millis(),
            ttl: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        let json = serde_json::to_string(&entry)?;
        self.storage.set_item(&self.physical_key(key), json)
    }

    /// Store `data`, logging instead of failing. Returns whether it was stored.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Duration) -> bool {
        match self.try_set(key, data, ttl) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Read the entry under `key` if present and unexpired.
    ///
    /// Expired or undecodable entries are removed and reported as a miss.
    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let physical = self.physical_key(key);
        let Some(raw) = self.storage.get_item(&physical)? else {
            return Ok(None);
        };

        match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) if is_expired(entry.timestamp, entry.ttl, self.clock.now_millis()) => {
                tracing::debug!(key, "Cache entry expired");
                self.storage.remove_item(&physical)?;
                Ok(None)
            }
            Ok(entry) => Ok(Some(entry.data)),
            Err(e) => {
                tracing::debug!(key, error = %e, "Undecodable cache entry, dropping");
                self.storage.remove_item(&physical)?;
                Ok(None)
            }
        }
    }

    /// Read `key`, treating backend errors as a miss
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.try_get(key).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Cache read failed");
            None
        })
    }

    // =========================================================================
    // INVALIDATION
    // =========================================================================

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.storage
            .remove_item(&self.physical_key(key))
            .unwrap_or_else(|e| {
                tracing::warn!(key, error = %e, "Cache invalidate failed");
                false
            })
    }

    /// Remove every entry whose key starts with `prefix`
    pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        let removed = self.remove_where(|key| key.starts_with(prefix));
        tracing::debug!(prefix, removed, "Invalidated cache prefix");
        removed
    }

    /// Remove every entry built for `resource`, whatever its parameters
    pub fn invalidate_resource(&self, resource: &str) -> usize {
        self.remove_where(|k| key::belongs_to(k, resource))
    }

    /// Remove every entry in this namespace
    pub fn clear_all(&self) -> usize {
        let removed = self.remove_where(|_| true);
        tracing::info!(namespace = %self.namespace, removed, "Cleared cache");
        removed
    }

    /// Eagerly drop expired and undecodable entries
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        self.remove_where(|key| !self.is_live(key, now))
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now_millis();
        let mut stats = CacheStats::default();

        for key in self.keys().unwrap_or_default() {
            match self.meta(&key) {
                Some(meta) if is_expired(meta.timestamp, meta.ttl, now) => stats.expired += 1,
                Some(_) => stats.live += 1,
                None => stats.corrupt += 1,
            }
        }
        stats
    }

    fn meta(&self, key: &str) -> Option<EntryMeta> {
        let raw = self.storage.get_item(&self.physical_key(key)).ok()??;
        serde_json::from_str(&raw).ok()
    }

    fn is_live(&self, key: &str, now: i64) -> bool {
        self.meta(key)
            .is_some_and(|meta| !is_expired(meta.timestamp, meta.ttl, now))
    }

    fn remove_where(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let keys = match self.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "Cache key scan failed");
                return 0;
            }
        };

        let doomed: Vec<String> = keys
            .iter()
            .filter(|key| predicate(key))
            .map(|key| self.physical_key(key))
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        self.storage.remove_items(&doomed).unwrap_or_else(|e| {
            tracing::warn!(count = doomed.len(), error = %e, "Cache batch removal failed");
            0
        })
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CacheError;
    use crate::storage::{FileStorage, MemoryStorage, Storage};
    use serde_json::Value;
    use std::sync::Arc;

    const FIFTEEN_MINUTES: Duration = Duration::from_millis(900_000);

    fn store() -> (CacheStore, Arc<ManualClock>, Arc<MemoryStorage>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let storage = Arc::new(MemoryStorage::new());
        let store = CacheStore::new(storage.clone(), clock.clone(), "test:");
        (store, clock, storage)
    }

    #[test]
    fn test_hit_then_expire() {
        let (store, clock, storage) = store();
        store.set("orders-p1", &vec![1, 2, 3], FIFTEEN_MINUTES);

        assert_eq!(store.get::<Vec<i32>>("orders-p1"), Some(vec![1, 2, 3]));

        clock.advance(Duration::from_millis(901_000));
        assert_eq!(store.get::<Vec<i32>>("orders-p1"), None);
        // Lazily removed on the expired read
        assert!(storage.get_item("test:orders-p1").unwrap().is_none());
    }

    #[test]
    fn test_expires_exactly_at_ttl() {
        let (store, clock, _) = store();
        store.set("k", &1, Duration::from_millis(100));

        clock.advance(Duration::from_millis(99));
        assert_eq!(store.get::<i32>("k"), Some(1));

        clock.advance(Duration::from_millis(1));
        assert_eq!(store.get::<i32>("k"), None);
    }

    #[test]
    fn test_set_overwrites_and_resets_timestamp() {
        let (store, clock, _) = store();
        store.set("k", &"old", Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));
        store.set("k", &"new", Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));

        assert_eq!(store.get::<String>("k").as_deref(), Some("new"));
    }

    #[test]
    fn test_invalidate_by_prefix() {
        let (store, _, _) = store();
        store.set("clients-a", &"X", FIFTEEN_MINUTES);
        store.set("clients-b", &"Y", FIFTEEN_MINUTES);
        store.set("orders-a", &"Z", FIFTEEN_MINUTES);

        assert_eq!(store.invalidate_by_prefix("clients"), 2);

        assert_eq!(store.get::<String>("clients-a"), None);
        assert_eq!(store.get::<String>("clients-b"), None);
        assert_eq!(store.get::<String>("orders-a").as_deref(), Some("Z"));
    }

    #[test]
    fn test_invalidate_resource_respects_boundary() {
        let (store, _, _) = store();
        store.set("orders", &1, FIFTEEN_MINUTES);
        store.set("orders-page=2", &2, FIFTEEN_MINUTES);
        store.set("orders_archive", &3, FIFTEEN_MINUTES);

        assert_eq!(store.invalidate_resource("orders"), 2);
        assert_eq!(store.get::<i32>("orders_archive"), Some(3));
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let (store, _, _) = store();
        store.set("k", &1, FIFTEEN_MINUTES);
        store.set("other", &2, FIFTEEN_MINUTES);

        assert!(store.invalidate("k"));
        assert!(!store.invalidate("k"));
        assert_eq!(store.get::<i32>("k"), None);
        assert_eq!(store.get::<i32>("other"), Some(2));
    }

    #[test]
    fn test_clear_all_only_touches_namespace() {
        let (store, _, storage) = store();
        storage.set_item("foreign:key", "keep".into()).unwrap();
        store.set("a", &1, FIFTEEN_MINUTES);
        store.set("b", &2, FIFTEEN_MINUTES);

        assert_eq!(store.clear_all(), 2);
        assert_eq!(store.get::<i32>("a"), None);
        assert_eq!(store.get::<i32>("b"), None);
        assert_eq!(storage.get_item("foreign:key").unwrap().as_deref(), Some("keep"));
    }

    #[test]
    fn test_corrupt_entry_reads_as_miss() {
        let (store, _, storage) = store();
        storage.set_item("test:bad", "{\"data\":".into()).unwrap();

        assert_eq!(store.get::<i32>("bad"), None);
        assert!(storage.get_item("test:bad").unwrap().is_none());
    }

    #[test]
    fn test_type_mismatch_reads_as_miss() {
        let (store, _, _) = store();
        store.set("k", &"text", FIFTEEN_MINUTES);
        assert_eq!(store.get::<Vec<u8>>("k"), None);
    }

    #[test]
    fn test_quota_failure_is_non_fatal() {
        let clock = Arc::new(ManualClock::new(0));
        let store = CacheStore::new(Arc::new(MemoryStorage::with_quota(16)), clock, "q:");

        assert!(!store.set("big", &"a long payload that will not fit", FIFTEEN_MINUTES));
        assert!(matches!(
            store.try_set("big", &"a long payload that will not fit", FIFTEEN_MINUTES),
            Err(CacheError::QuotaExceeded { .. })
        ));
        assert_eq!(store.get::<String>("big"), None);
    }

    #[test]
    fn test_stats_and_purge() {
        let (store, clock, storage) = store();
        store.set("short", &1, Duration::from_secs(1));
        store.set("long", &2, Duration::from_secs(60));
        storage.set_item("test:junk", "nope".into()).unwrap();

        clock.advance(Duration::from_secs(5));
        assert_eq!(
            store.stats(),
            CacheStats {
                live: 1,
                expired: 1,
                corrupt: 1
            }
        );

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.keys().unwrap(), vec!["long".to_string()]);
    }

    #[test]
    fn test_persisted_entry_layout() {
        let (store, _, storage) = store();
        store.set("orders-p1", &vec!["a", "b"], FIFTEEN_MINUTES);

        let raw = storage.get_item("test:orders-p1").unwrap().unwrap();
        let entry: Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(entry["data"], serde_json::json!(["a", "b"]));
        assert_eq!(entry["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(entry["ttl"], 900_000);
        assert!(storage.get_item("orders-p1").unwrap().is_none());
    }

    #[test]
    fn test_file_backed_entry_survives_reopen_then_expires() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));

        let store = CacheStore::new(
            Arc::new(FileStorage::open(&path).unwrap()),
            clock.clone(),
            "test:",
        );
        assert!(store.set("clients", &vec![1, 2], FIFTEEN_MINUTES));
        drop(store);

        let reopened = CacheStore::new(
            Arc::new(FileStorage::open(&path).unwrap()),
            clock.clone(),
            "test:",
        );
        assert_eq!(reopened.get::<Vec<i32>>("clients"), Some(vec![1, 2]));

        clock.advance(FIFTEEN_MINUTES);
        assert_eq!(reopened.get::<Vec<i32>>("clients"), None);

        let raw = FileStorage::open(&path).unwrap();
        assert!(raw.get_item("test:clients").unwrap().is_none());
    }

    #[test]
    fn test_clear_all_over_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let clock = Arc::new(ManualClock::new(0));
        let storage = Arc::new(FileStorage::open(&path).unwrap());
        storage.set_item("foreign:key", "keep".into()).unwrap();

        let store = CacheStore::new(storage, clock, "test:");
        for key in ["teams", "units", "orders-page=2"] {
            store.set(key, &1, FIFTEEN_MINUTES);
        }

        assert_eq!(store.clear_all(), 3);

        let raw = FileStorage::open(&path).unwrap();
        assert_eq!(raw.keys().unwrap(), vec!["foreign:key".to_string()]);
    }
}
