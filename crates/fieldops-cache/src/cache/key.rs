//! Cache key composition.
//!
//! Keys are `resource` for unparameterised queries and
//! `resource-name=value&name=value` otherwise, with parameters sorted by
//! name so the same query always maps to the same key.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

/// Separator between the resource name and its parameter suffix
pub const RESOURCE_SEPARATOR: char = '-';

/// Builder for cache keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    resource: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            params: BTreeMap::new(),
        }
    }

    /// Key for a single entity of a resource
    pub fn detail(resource: impl Into<String>, id: Uuid) -> Self {
        Self::new(resource).param("id", id)
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Add a parameter only when present
    #[must_use]
    pub fn opt_param<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    pub fn build(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)?;

        let mut first = true;
        for (name, value) in &self.params {
            let sep = if first { RESOURCE_SEPARATOR } else { '&' };
            write!(f, "{sep}{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}

/// Whether `key` was built for `resource`
pub fn belongs_to(key: &str, resource: &str) -> bool {
    key == resource
        || key
            .strip_prefix(resource)
            .is_some_and(|rest| rest.starts_with(RESOURCE_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_resource() {
        assert_eq!(CacheKey::new("teams").build(), "teams");
    }

    #[test]
    fn test_params_sorted() {
        let key = CacheKey::new("orders")
            .param("status", "pending")
            .param("page", 2)
            .opt_param::<u32>("client_id", None);
        assert_eq!(key.build(), "orders-page=2&status=pending");
    }

    #[test]
    fn test_belongs_to() {
        assert!(belongs_to("orders", "orders"));
        assert!(belongs_to("orders-page=1", "orders"));
        assert!(!belongs_to("orders_archive", "orders"));
        assert!(!belongs_to("ord", "orders"));
    }
}
