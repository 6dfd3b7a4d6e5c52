//! # Cache Module
//!
//! TTL entry store over a pluggable local-storage style backend.

pub mod config;
pub mod key;
pub mod store;

pub use config::{CacheConfig, CacheTtl, DEFAULT_NAMESPACE};
pub use key::CacheKey;
pub use store::{CacheStats, CacheStore};
