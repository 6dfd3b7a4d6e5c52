//! Read strategy implementations using enum dispatch.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::CacheStore;

/// Read strategy enum - determines cache/source access pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Check cache first, fetch from source on miss
    #[default]
    CacheFirst,
    /// Only read from source, skip cache
    SourceOnly,
    /// Only read from cache, never hit the source
    CacheOnly,
    /// Read from source, populate cache on success
    RefreshThrough,
}

/// Where a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Source,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "hit",
            Self::Source => "miss",
        }
    }
}

/// Value plus its origin
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub origin: Origin,
}

impl<T> Fetched<T> {
    pub fn is_hit(&self) -> bool {
        self.origin == Origin::Cache
    }
}

impl ReadStrategy {
    /// Execute a read according to the strategy.
    ///
    /// - `store`: cache consulted and populated under `key`
    /// - `fetch`: async source read, called at most once
    ///
    /// Concurrent reads of the same key are not coalesced; the last fetch to
    /// complete wins the cache slot.
    pub async fn read<T, E, Fut>(
        &self,
        store: &CacheStore,
        key: &str,
        ttl: Duration,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<Fetched<T>, ReadError<E>>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, E>>,
    {
        match self {
            ReadStrategy::CacheFirst => {
                if let Some(value) = store.get::<T>(key) {
                    tracing::debug!(key, "Cache hit");
                    return Ok(Fetched {
                        value,
                        origin: Origin::Cache,
                    });
                }
                tracing::debug!(key, "Cache miss, fetching from source");

                Self::fetch_and_populate(store, key, ttl, fetch).await
            }

            ReadStrategy::SourceOnly => {
                let value = fetch().await.map_err(ReadError::Source)?;
                Ok(Fetched {
                    value,
                    origin: Origin::Source,
                })
            }

            ReadStrategy::CacheOnly => store
                .get::<T>(key)
                .map(|value| Fetched {
                    value,
                    origin: Origin::Cache,
                })
                .ok_or_else(|| ReadError::NotCached(key.to_string())),

            ReadStrategy::RefreshThrough => Self::fetch_and_populate(store, key, ttl, fetch).await,
        }
    }

    async fn fetch_and_populate<T, E, Fut>(
        store: &CacheStore,
        key: &str,
        ttl: Duration,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<Fetched<T>, ReadError<E>>
    where
        T: Serialize,
        Fut: Future<Output = Result<T, E>>,
    {
        let value = fetch().await.map_err(ReadError::Source)?;

        // A failed write is logged inside the store and never fails the read
        store.set(key, &value, ttl);

        Ok(Fetched {
            value,
            origin: Origin::Source,
        })
    }
}

/// Read operation error.
#[derive(Debug, thiserror::Error)]
pub enum ReadError<E> {
    #[error("No cached value for key: {0}")]
    NotCached(String),
    #[error("Source error: {0}")]
    Source(#[source] E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    #[derive(Debug, thiserror::Error)]
    #[error("backend down")]
    struct Down;

    fn store() -> CacheStore {
        CacheStore::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(ManualClock::new(0)),
            "rs:",
        )
    }

    #[tokio::test]
    async fn test_cache_first_hit() {
        let store = store();
        store.set("k", &42, TTL);

        let result = ReadStrategy::CacheFirst
            .read(&store, "k", TTL, || async { Ok::<_, Down>(99) })
            .await
            .unwrap();

        assert_eq!(result.value, 42); // Should return cache value
        assert!(result.is_hit());
    }

    #[tokio::test]
    async fn test_cache_first_miss_populates() {
        let store = store();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = ReadStrategy::CacheFirst
                .read(&store, "k", TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Down>(99)
                })
                .await
                .unwrap();
            assert_eq!(result.value, 99);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1); // Second read served from cache
    }

    #[tokio::test]
    async fn test_source_error_not_cached() {
        let store = store();

        let err = ReadStrategy::CacheFirst
            .read::<i32, _, _>(&store, "k", TTL, || async { Err(Down) })
            .await
            .unwrap_err();

        assert!(matches!(err, ReadError::Source(Down)));
        assert_eq!(store.get::<i32>("k"), None);
    }

    #[tokio::test]
    async fn test_source_only() {
        let store = store();
        store.set("k", &42, TTL);

        let result = ReadStrategy::SourceOnly
            .read(&store, "k", TTL, || async { Ok::<_, Down>(99) })
            .await
            .unwrap();

        assert_eq!(result.value, 99); // Should skip cache
        assert_eq!(store.get::<i32>("k"), Some(42)); // and leave it alone
    }

    #[tokio::test]
    async fn test_cache_only_miss() {
        let store = store();

        let err = ReadStrategy::CacheOnly
            .read::<i32, Down, _>(&store, "k", TTL, || async { Ok(99) })
            .await
            .unwrap_err();

        assert!(matches!(err, ReadError::NotCached(key) if key == "k"));
    }

    #[tokio::test]
    async fn test_refresh_through_overwrites() {
        let store = store();
        store.set("k", &1, TTL);

        let result = ReadStrategy::RefreshThrough
            .read(&store, "k", TTL, || async { Ok::<_, Down>(2) })
            .await
            .unwrap();

        assert_eq!(result.origin, Origin::Source);
        assert_eq!(store.get::<i32>("k"), Some(2));
    }
}
