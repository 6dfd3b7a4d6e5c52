//! # Cache Service
//!
//! Explicitly constructed owner of the entry store and the invalidation bus.
//! Created once at application start, shared behind an `Arc`, and torn down
//! with [`CacheService::shutdown`].
//!
//! Categories are bound to resource prefixes. Invalidating a category drops
//! every cached entry of its bound resources synchronously and then
//! broadcasts the event, so the next read after a local mutation is always a
//! miss. Events arriving from other processes through the relay are handled
//! by a background listener that drops the same prefixes.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use fieldops_domain::{Category, InvalidationEvent, Resource};

use crate::bus::InvalidationBus;
use crate::cache::{CacheConfig, CacheKey, CacheStats, CacheStore, CacheTtl};
use crate::clock::SharedClock;
use crate::storage::SharedStorage;
use crate::strategy::{Fetched, ReadError, ReadStrategy, WriteStrategy};

#[cfg(feature = "redis")]
use crate::bus::RedisRelay;

type Bindings = Arc<RwLock<BTreeMap<Category, Vec<String>>>>;

/// Result of invalidating a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationOutcome {
    /// Cached entries dropped locally
    pub removed: usize,
    pub event: InvalidationEvent,
}

/// Snapshot for the admin endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub namespace: String,
    pub entries: CacheStats,
    pub last_invalidated: BTreeMap<Category, i64>,
    pub subscribers: BTreeMap<Category, usize>,
}

/// Cache store plus invalidation bus with a defined lifecycle
pub struct CacheService {
    store: CacheStore,
    bus: Arc<InvalidationBus>,
    bindings: Bindings,
    ttl: CacheTtl,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    #[cfg(feature = "redis")]
    relay: Mutex<Option<RedisRelay>>,
}

impl CacheService {
    /// Build the service and start its remote-event listener.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(config: CacheConfig, storage: SharedStorage, clock: SharedClock) -> Self {
        let store = CacheStore::new(storage, clock.clone(), config.namespace.clone());
        let bus = Arc::new(InvalidationBus::new(clock, config.channel_capacity));
        let bindings: Bindings = Arc::new(RwLock::new(config.bindings));

        let listener = tokio::spawn(drop_remote_invalidations(
            bus.id(),
            bus.firehose(),
            store.clone(),
            bindings.clone(),
        ));

        tracing::info!(
            namespace = %config.namespace,
            bus = %bus.id(),
            "Cache service started"
        );

        Self {
            store,
            bus,
            bindings,
            ttl: config.ttl,
            tasks: Mutex::new(vec![listener]),
            #[cfg(feature = "redis")]
            relay: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn bus(&self) -> &Arc<InvalidationBus> {
        &self.bus
    }

    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    // =========================================================================
    // BINDINGS
    // =========================================================================

    /// Drop entries of `resource` whenever `category` is invalidated
    pub fn bind(&self, category: Category, resource: impl Into<String>) {
        let resource = resource.into();
        let Ok(mut bindings) = self.bindings.write() else {
            tracing::error!("Cache bindings lock poisoned");
            return;
        };
        for category in category.expand() {
            let resources = bindings.entry(category).or_default();
            if !resources.contains(&resource) {
                resources.push(resource.clone());
            }
        }
    }

    pub fn bound_resources(&self, category: Category) -> Vec<String> {
        resources_for(&self.bindings, category)
    }

    // =========================================================================
    // READS / WRITES
    // =========================================================================

    /// Cache-aside read under `key`
    pub async fn fetch<T, E, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        strategy: ReadStrategy,
        fetcher: impl FnOnce() -> Fut,
    ) -> Result<Fetched<T>, ReadError<E>>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, E>>,
    {
        strategy.read(&self.store, key, ttl, fetcher).await
    }

    /// Run a mutation and invalidate the entity's category afterwards.
    ///
    /// `WriteThrough` also caches the written entity under its detail key.
    pub async fn mutate<T, E, Fut>(
        &self,
        strategy: WriteStrategy,
        writer: impl FnOnce() -> Fut,
    ) -> Result<T, E>
    where
        T: Resource + Serialize,
        Fut: Future<Output = Result<T, E>>,
    {
        strategy
            .write(
                writer,
                |entity: &T| {
                    self.invalidate(T::CATEGORY, Some(entity.id()));
                },
                |entity: &T| {
                    let key = CacheKey::detail(T::RESOURCE, entity.id()).build();
                    self.store.set(&key, entity, self.ttl.detail);
                },
            )
            .await
    }

    // =========================================================================
    // INVALIDATION
    // =========================================================================

    /// Drop bound entries for `category`, then broadcast
    pub fn invalidate(&self, category: Category, entity_id: Option<Uuid>) -> InvalidationOutcome {
        let removed = drop_bound(&self.store, &self.bindings, category);
        let event = self.bus.invalidate(category, entity_id);

        tracing::info!(
            category = %category,
            entity_id = ?entity_id,
            removed,
            "Invalidated category"
        );

        InvalidationOutcome { removed, event }
    }

    pub fn invalidate_all(&self) -> InvalidationOutcome {
        self.invalidate(Category::All, None)
    }

    /// Remove every entry in the namespace without broadcasting
    pub fn clear_all(&self) -> usize {
        self.store.clear_all()
    }

    pub fn stats(&self) -> ServiceStats {
        let last_invalidated = Category::CONCRETE
            .iter()
            .filter_map(|c| self.bus.last_invalidated(*c).map(|at| (*c, at)))
            .collect();
        let subscribers = Category::CONCRETE
            .iter()
            .map(|c| (*c, self.bus.subscriber_count(*c)))
            .collect();

        ServiceStats {
            namespace: self.store.namespace().to_string(),
            entries: self.store.stats(),
            last_invalidated,
            subscribers,
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Relay invalidations to and from other processes through Redis
    #[cfg(feature = "redis")]
    pub async fn connect_relay(&self, url: &str, channel: &str) -> crate::error::Result<()> {
        let relay = RedisRelay::connect(url, channel, self.bus.clone()).await?;
        if let Ok(mut slot) = self.relay.lock() {
            if let Some(previous) = slot.replace(relay) {
                previous.shutdown();
            }
        }
        Ok(())
    }

    /// Stop background work. Persisted entries are left in place.
    pub fn shutdown(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }

        self.stop_relay();

        tracing::info!(namespace = %self.store.namespace(), "Cache service stopped");
    }

    #[cfg(feature = "redis")]
    fn stop_relay(&self) {
        if let Ok(mut slot) = self.relay.lock() {
            if let Some(relay) = slot.take() {
                relay.shutdown();
            }
        }
    }

    #[cfg(not(feature = "redis"))]
    #[allow(clippy::unused_self)]
    fn stop_relay(&self) {}
}

impl Drop for CacheService {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("store", &self.store)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

fn resources_for(bindings: &Bindings, category: Category) -> Vec<String> {
    let Ok(bindings) = bindings.read() else {
        tracing::error!("Cache bindings lock poisoned");
        return Vec::new();
    };

    let mut resources: Vec<String> = category
        .expand()
        .into_iter()
        .filter_map(|c| bindings.get(&c))
        .flatten()
        .cloned()
        .collect();
    resources.sort();
    resources.dedup();
    resources
}

fn drop_bound(store: &CacheStore, bindings: &Bindings, category: Category) -> usize {
    resources_for(bindings, category)
        .iter()
        .map(|resource| store.invalidate_resource(resource))
        .sum()
}

async fn drop_remote_invalidations(
    local: Uuid,
    mut events: broadcast::Receiver<InvalidationEvent>,
    store: CacheStore,
    bindings: Bindings,
) {
    loop {
        match events.recv().await {
            Ok(event) if event.origin != local => {
                let removed = drop_bound(&store, &bindings, event.category);
                tracing::debug!(
                    category = %event.category,
                    origin = %event.origin,
                    removed,
                    "Dropped entries for remote invalidation"
                );
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                // Missed events could have named any category
                let removed = drop_bound(&store, &bindings, Category::All);
                tracing::warn!(skipped, removed, "Invalidation listener lagged, dropped all bound entries");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
