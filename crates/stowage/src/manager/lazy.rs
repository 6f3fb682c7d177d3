//! Deferred cache store

use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use stowage_core::{CacheBackend, CacheError, DriverConfig, DriverRegistry, Loader, Result};

/// A cache that opens its driver on first use
///
/// The driver is opened at most once, even under concurrent first calls.
/// Its outcome, success or failure, is kept and shared with every later
/// caller; a failed open is not retried.
pub struct LazyCache {
    driver: Option<String>,
    config: DriverConfig,
    registry: Arc<DriverRegistry>,
    cache: OnceLock<Result<Arc<dyn CacheBackend>>>,
}

impl LazyCache {
    /// Defer opening `driver` with `config` through the global registry
    pub fn new(driver: impl Into<String>, config: DriverConfig) -> Self {
        Self::with_registry(Some(driver.into()), config, DriverRegistry::global().clone())
    }

    /// Defer opening the driver named by the config's `driver` option
    pub fn from_config(config: DriverConfig) -> Self {
        Self::from_config_in(config, DriverRegistry::global().clone())
    }

    /// Like [`LazyCache::from_config`], resolving against `registry`
    pub fn from_config_in(config: DriverConfig, registry: Arc<DriverRegistry>) -> Self {
        let driver = config.driver().map(str::to_string);
        Self::with_registry(driver, config, registry)
    }

    fn with_registry(
        driver: Option<String>,
        config: DriverConfig,
        registry: Arc<DriverRegistry>,
    ) -> Self {
        Self {
            driver,
            config,
            registry,
            cache: OnceLock::new(),
        }
    }

    /// Driver this cache opens, if one is configured
    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    /// Whether the open has already been attempted
    pub fn is_resolved(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Open the underlying store, or return the outcome of the first open
    pub fn resolve(&self) -> Result<Arc<dyn CacheBackend>> {
        self.cache
            .get_or_init(|| {
                let driver = self
                    .driver
                    .as_deref()
                    .ok_or_else(|| CacheError::Config("no driver configured".into()))?;
                let opened = self.registry.open(driver, &self.config);
                match &opened {
                    Ok(_) => debug!(driver, "opened deferred cache store"),
                    Err(err) => warn!(driver, error = %err, "failed to open deferred cache store"),
                }
                opened
            })
            .clone()
    }
}

impl std::fmt::Debug for LazyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyCache")
            .field("driver", &self.driver)
            .field("config", &self.config)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[async_trait]
impl CacheBackend for LazyCache {
    async fn get(&self, key: &str) -> Result<String> {
        self.resolve()?.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.resolve()?.set(key, value, ttl).await
    }

    async fn has(&self, key: &str) -> bool {
        match self.resolve() {
            Ok(cache) => cache.has(key).await,
            Err(err) => {
                warn!(key, error = %err, "deferred cache store unavailable");
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.resolve()?.delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        self.resolve()?.clear().await
    }

    async fn load(&self, key: &str, loader: Loader, ttl: Duration) -> Result<String> {
        self.resolve()?.load(key, loader, ttl).await
    }
}
