//! Configuration for Redis backend

use serde::Deserialize;
use std::time::Duration;

use stowage_core::config::de;
use stowage_core::{DEFAULT_EXPIRE, DEFAULT_PREFIX, Result, validate_prefix};

/// Configuration for the Redis backend
///
/// The client pool travels as a resource, see
/// [`CLIENT_RESOURCE`](super::CLIENT_RESOURCE), or is built by
/// [`RedisBackend::connect`](super::RedisBackend::connect).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RedisConfig {
    /// Key prefix scoping this instance (default: `"cache"`)
    pub prefix: String,
    /// TTL applied when `set` receives a zero TTL (default: 72h)
    #[serde(deserialize_with = "de::duration")]
    pub expire: Duration,
    /// Pool size used by `connect`
    pub pool_size: u32,
    /// Connection timeout used by `connect`
    #[serde(deserialize_with = "de::duration")]
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            expire: DEFAULT_EXPIRE,
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Set key prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the default TTL
    pub fn expire(mut self, expire: Duration) -> Self {
        self.expire = expire;
        self
    }

    /// Set pool size
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub(crate) fn normalized(mut self) -> Result<Self> {
        let defaults = Self::default();
        if self.prefix.is_empty() {
            self.prefix = defaults.prefix;
        }
        if self.expire.is_zero() {
            self.expire = defaults.expire;
        }
        if self.pool_size == 0 {
            self.pool_size = defaults.pool_size;
        }
        if self.connection_timeout.is_zero() {
            self.connection_timeout = defaults.connection_timeout;
        }
        validate_prefix(&self.prefix)?;
        Ok(self)
    }
}
