//! # API Configuration
//!
//! Environment-based configuration for the dashboard API service.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use fieldops_cache::{CacheConfig, CacheTtl, FileStorage, MemoryStorage, SharedStorage};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub server_addr: SocketAddr,

    /// Logging level
    pub log_level: String,

    /// CORS allowed origins
    pub cors_origins: Vec<String>,

    /// Load demo records at startup
    pub seed_demo_data: bool,

    /// Cache configuration
    pub cache: CacheSettings,

    /// Redis relay configuration, when cross-process invalidation is wanted
    pub redis: Option<RedisConfig>,
}

/// Where cache entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            _ => Err(()),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub namespace: String,
    pub backend: StorageBackend,
    pub file_path: PathBuf,
    pub quota_bytes: Option<usize>,
    pub ttl: CacheTtl,
}

/// Redis relay configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub channel: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ttl_defaults = defaults.cache.ttl;

        Ok(Self {
            server_addr: parse_var("SERVER_ADDR", defaults.server_addr)?,

            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),

            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| v.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),

            seed_demo_data: env::var("SEED_DEMO_DATA")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.seed_demo_data),

            cache: CacheSettings {
                namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.cache.namespace),
                backend: parse_var("CACHE_BACKEND", defaults.cache.backend)?,
                file_path: env::var("CACHE_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.cache.file_path),
                quota_bytes: match env::var("CACHE_QUOTA_BYTES") {
                    Ok(raw) => Some(parse_value("CACHE_QUOTA_BYTES", &raw)?),
                    Err(_) => None,
                },
                ttl: CacheTtl {
                    reference: secs_var("CACHE_TTL_REFERENCE_SECS", ttl_defaults.reference)?,
                    listing: secs_var("CACHE_TTL_LISTING_SECS", ttl_defaults.listing)?,
                    detail: secs_var("CACHE_TTL_DETAIL_SECS", ttl_defaults.detail)?,
                    dashboard: secs_var("CACHE_TTL_DASHBOARD_SECS", ttl_defaults.dashboard)?,
                },
            },

            redis: env::var("REDIS_URL").ok().map(|url| RedisConfig {
                url,
                channel: env::var("REDIS_CHANNEL")
                    .unwrap_or_else(|_| fieldops_cache::bus::relay::DEFAULT_CHANNEL.to_string()),
            }),
        })
    }

    /// Cache service configuration derived from these settings
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            namespace: self.cache.namespace.clone(),
            ttl: self.cache.ttl,
            ..CacheConfig::default()
        }
    }

    /// Open the configured storage backend
    pub fn build_storage(&self) -> fieldops_cache::Result<SharedStorage> {
        Ok(match (self.cache.backend, self.cache.quota_bytes) {
            (StorageBackend::File, _) => {
                let storage = FileStorage::open(&self.cache.file_path)?;
                tracing::info!(path = %storage.path().display(), "File cache storage opened");
                Arc::new(storage)
            }
            (StorageBackend::Memory, Some(quota)) => Arc::new(MemoryStorage::with_quota(quota)),
            (StorageBackend::Memory, None) => Arc::new(MemoryStorage::new()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            cors_origins: vec!["*".to_string()],
            seed_demo_data: true,
            cache: CacheSettings {
                namespace: fieldops_cache::cache::DEFAULT_NAMESPACE.to_string(),
                backend: StorageBackend::Memory,
                file_path: PathBuf::from("data/cache.json"),
                quota_bytes: None,
                ttl: CacheTtl::default(),
            },
            redis: None,
        }
    }
}

fn parse_value<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
    })
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => parse_value(var, &raw),
        Err(_) => Ok(default),
    }
}

fn secs_var(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(raw) => parse_value(var, &raw).map(Duration::from_secs),
        Err(_) => Ok(default),
    }
}
