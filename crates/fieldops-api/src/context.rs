//! # App Context
//!
//! Shared state handed to every handler.

use std::sync::Arc;

use fieldops_cache::CacheService;

use crate::repository::{MemoryRecordStore, RecordStore};

/// Application context shared across all handlers
#[derive(Clone)]
pub struct AppContext {
    /// Cache store plus invalidation bus
    pub cache: Arc<CacheService>,

    /// Source of truth
    pub records: Arc<dyn RecordStore>,
}

impl AppContext {
    pub fn new(cache: Arc<CacheService>, records: Arc<dyn RecordStore>) -> Self {
        Self { cache, records }
    }

    /// Context over an in-process record store
    pub fn in_memory(cache: Arc<CacheService>, seed: bool) -> Self {
        let records: Arc<dyn RecordStore> = if seed {
            Arc::new(MemoryRecordStore::seeded())
        } else {
            Arc::new(MemoryRecordStore::new())
        };
        Self::new(cache, records)
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
