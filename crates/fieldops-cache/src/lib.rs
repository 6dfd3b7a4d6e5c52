//! # FieldOps Cache
//!
//! Client-side accelerator in front of the dashboard's data source: a TTL
//! entry store plus a category invalidation bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Layer                        │
//! │            (listing handlers, mutation handlers)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CacheService                           │
//! │      (read/write strategies, category → resource bindings)   │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │      CacheStore         │   │      InvalidationBus         │
//! │  (namespace, TTL, JSON) │   │ (channel per category, relay)│
//! └─────────────────────────┘   └──────────────────────────────┘
//!              │                                 │
//!              ▼                                 ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │  Storage: memory / file │   │   Redis pub/sub (optional)   │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `redis`: Enable the cross-process invalidation relay (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fieldops_cache::{CacheConfig, CacheService, MemoryStorage, ReadStrategy, SystemClock};
//!
//! let cache = CacheService::start(
//!     CacheConfig::default(),
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! let teams = cache
//!     .fetch("teams", cache.ttl().reference, ReadStrategy::CacheFirst, || repo.list_teams())
//!     .await?;
//!
//! cache.invalidate(Category::Teams, None);
//! cache.shutdown();
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod cache;
pub mod clock;
pub mod error;
pub mod service;
pub mod storage;
pub mod strategy;

// Re-export commonly used types
pub use bus::{Freshness, InvalidationBus, ListenerHandle, Subscription};
pub use cache::{CacheConfig, CacheKey, CacheStats, CacheStore, CacheTtl};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{CacheError, Result};
pub use service::{CacheService, InvalidationOutcome, ServiceStats};
pub use storage::{FileStorage, MemoryStorage, SharedStorage, Storage};
pub use strategy::{Fetched, Origin, ReadError, ReadStrategy, WriteStrategy};

#[cfg(feature = "redis")]
pub use bus::RedisRelay;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
