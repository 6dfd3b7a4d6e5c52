//! In-process storage backend.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::Storage;
use crate::error::{CacheError, Result};

/// Concurrent in-memory backend with an optional byte quota
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: DashMap<String, String>,
    /// Key plus value bytes, updated while the key's shard is locked
    used: AtomicUsize,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects writes once keys plus values exceed `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Bytes currently used by keys and values
    pub fn used_bytes(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    fn check_quota(&self, needed: usize, replaced: usize) -> Result<()> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };

        let others = self.used_bytes().saturating_sub(replaced);
        let available = quota.saturating_sub(others);
        if needed > available {
            return Err(CacheError::QuotaExceeded { needed, available });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    fn set_item(&self, key: &str, value: String) -> Result<()> {
        let needed = key.len() + value.len();

        // Check and write under the same shard lock
        match self.items.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                let replaced = key.len() + slot.get().len();
                self.check_quota(needed, replaced)?;
                slot.insert(value);
                self.used.fetch_add(needed, Ordering::AcqRel);
                self.used.fetch_sub(replaced, Ordering::AcqRel);
            }
            Entry::Vacant(slot) => {
                self.check_quota(needed, 0)?;
                slot.insert(value);
                self.used.fetch_add(needed, Ordering::AcqRel);
            }
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<bool> {
        match self.items.remove(key) {
            Some((key, value)) => {
                self.used.fetch_sub(key.len() + value.len(), Ordering::AcqRel);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.iter().map(|item| item.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let storage = MemoryStorage::new();
        storage.set_item("a", "1".into()).unwrap();
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));

        assert!(storage.remove_item("a").unwrap());
        assert!(!storage.remove_item("a").unwrap());
        assert!(storage.get_item("a").unwrap().is_none());
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("k", "12345".into()).unwrap();

        let err = storage.set_item("big", "0123456789".into()).unwrap_err();
        assert!(matches!(err, CacheError::QuotaExceeded { .. }));
        assert!(storage.get_item("big").unwrap().is_none());
    }

    #[test]
    fn test_quota_counts_replaced_value_once() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("k", "123456789".into()).unwrap();
        // Overwriting the same key frees the old value first
        storage.set_item("k", "987654321".into()).unwrap();
        assert_eq!(storage.used_bytes(), 10);
    }

    #[test]
    fn test_concurrent_set_and_remove_keep_usage_consistent() {
        let storage = MemoryStorage::with_quota(1024 * 1024);
        let value = "x".repeat(64);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        storage.set_item("hot", value.clone()).unwrap();
                        storage.remove_item("hot").unwrap();
                    }
                });
            }
        });

        assert!(storage.is_empty());
        assert_eq!(storage.used_bytes(), 0);

        storage.set_item("hot", value.clone()).unwrap();
        assert_eq!(storage.used_bytes(), "hot".len() + value.len());
    }
}
