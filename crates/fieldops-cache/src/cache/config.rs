//! Cache configuration: TTL table, namespace and category bindings.

use std::collections::BTreeMap;
use std::time::Duration;

use fieldops_domain::Category;

/// Default namespace prefixed to every stored key
pub const DEFAULT_NAMESPACE: &str = "fieldops-cache:";

/// Cache TTL configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    /// Teams, units, commodities
    pub reference: Duration,
    /// Paged order/invoice/client listings
    pub listing: Duration,
    /// Single entity lookups
    pub detail: Duration,
    /// Dashboard counters
    pub dashboard: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            reference: Duration::from_secs(3600),
            listing: Duration::from_secs(900),
            detail: Duration::from_secs(300),
            dashboard: Duration::from_secs(120),
        }
    }
}

/// Cache service configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub namespace: String,
    pub ttl: CacheTtl,
    /// Resource prefixes dropped when a category is invalidated
    pub bindings: BTreeMap<Category, Vec<String>>,
    /// Per-category broadcast channel capacity
    pub channel_capacity: usize,
}

impl CacheConfig {
    pub fn default_bindings() -> BTreeMap<Category, Vec<String>> {
        let bind = |resources: &[&str]| resources.iter().map(|r| (*r).to_string()).collect();

        BTreeMap::from([
            (Category::Orders, bind(&["orders", "dashboard"])),
            (Category::Invoices, bind(&["invoices", "dashboard"])),
            (Category::Clients, bind(&["clients", "dashboard"])),
            (Category::Teams, bind(&["teams"])),
            (Category::Units, bind(&["units"])),
            (Category::Commodities, bind(&["commodities"])),
        ])
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl: CacheTtl::default(),
            bindings: Self::default_bindings(),
            channel_capacity: 256,
        }
    }
}
