//! # Storage Backends
//!
//! String key/value backends modelled on browser local storage. The cache
//! store layers namespacing, JSON envelopes and expiry on top.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;

use crate::error::Result;

/// Local-storage style key/value backend
pub trait Storage: Send + Sync {
    /// Read a raw value
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw value, replacing any previous one
    fn set_item(&self, key: &str, value: String) -> Result<()>;

    /// Remove a key. Returns whether it existed.
    fn remove_item(&self, key: &str) -> Result<bool>;

    /// Snapshot of all keys
    fn keys(&self) -> Result<Vec<String>>;

    /// Remove several keys at once. Returns how many existed.
    ///
    /// Backends that pay per write should override this to commit once.
    fn remove_items(&self, keys: &[String]) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            if self.remove_item(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Shared storage handle
pub type SharedStorage = Arc<dyn Storage>;
