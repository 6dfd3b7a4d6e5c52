//! Write strategy implementations using enum dispatch.

use std::future::Future;

/// Write strategy enum - determines how a mutation touches the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Write to source only, invalidate cache
    #[default]
    WriteAround,
    /// Write to source, invalidate, then cache the written value
    WriteThrough,
    /// Write to source only, no cache interaction
    SourceOnly,
}

impl WriteStrategy {
    /// Execute a write according to the strategy.
    ///
    /// - `write_fn`: async write against the source of truth
    /// - `invalidate_fn`: drops stale cached data and notifies subscribers
    /// - `cache_fn`: stores the written value (`WriteThrough` only)
    ///
    /// Cache-side hooks run only after the source write succeeded.
    pub async fn write<T, E, Fut>(
        &self,
        write_fn: impl FnOnce() -> Fut,
        invalidate_fn: impl FnOnce(&T),
        cache_fn: impl FnOnce(&T),
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let value = write_fn().await?;

        match self {
            WriteStrategy::WriteAround => invalidate_fn(&value),
            WriteStrategy::WriteThrough => {
                // Invalidate first so the fresh entry survives the prefix drop
                invalidate_fn(&value);
                cache_fn(&value);
            }
            WriteStrategy::SourceOnly => {}
        }

        Ok(value)
    }
}
