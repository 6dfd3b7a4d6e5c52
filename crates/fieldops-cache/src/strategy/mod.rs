//! # Strategy Module
//!
//! Enum-based cache/source access strategies using dispatch pattern.
//!
//! ## Available Strategies
//!
//! ### Read Strategies
//! - `CacheFirst` - Check cache, fetch from source on miss (default)
//! - `SourceOnly` - Skip cache entirely
//! - `CacheOnly` - Never hit the source
//! - `RefreshThrough` - Always fetch from source, repopulate cache
//!
//! ### Write Strategies
//! - `WriteAround` - Write to source, invalidate cache (default)
//! - `WriteThrough` - Write to source, invalidate, then cache the result
//! - `SourceOnly` - Write to source, no cache interaction
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldops_cache::strategy::ReadStrategy;
//!
//! let fetched = ReadStrategy::CacheFirst
//!     .read(&store, "teams", ttl, || repo.list_teams())
//!     .await?;
//! ```

pub mod read_strategy;
pub mod write_strategy;

pub use read_strategy::{Fetched, Origin, ReadError, ReadStrategy};
pub use write_strategy::WriteStrategy;
