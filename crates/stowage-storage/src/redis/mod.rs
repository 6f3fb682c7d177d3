//! Redis cache backend

mod backend;
mod config;

pub use backend::{RedisBackend, RedisPool};
pub use config::RedisConfig;

use std::sync::Arc;

use stowage_core::{CacheBackend, CacheError, Driver, DriverConfig, Result};

/// Name the Redis driver registers under.
pub const DRIVER_NAME: &str = "redis";

/// Resource key carrying the [`RedisPool`].
pub const CLIENT_RESOURCE: &str = "client";

/// Driver opening [`RedisBackend`]s
///
/// Requires a [`RedisPool`] resource under `client`. Recognized options:
/// `prefix`, `expire`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisDriver;

impl Driver for RedisDriver {
    fn open(&self, config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
        let pool: RedisPool = config
            .resource(CLIENT_RESOURCE)
            .ok_or_else(|| CacheError::Config("client is required".into()))?;
        let settings: RedisConfig = config.decode()?;
        Ok(Arc::new(RedisBackend::new(pool, settings)?))
    }
}

/// Register the Redis driver in the process-wide registry.
pub fn register() {
    stowage_core::registry::register(DRIVER_NAME, RedisDriver);
}

/// Open a Redis store from a configuration map.
pub fn open(config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
    RedisDriver.open(config)
}
