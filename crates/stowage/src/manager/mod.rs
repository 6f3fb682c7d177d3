//! Named cache stores

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::{debug, warn};

use stowage_core::{CacheBackend, CacheError, DriverConfig, DriverRegistry, Loader, Result};

mod lazy;
pub use lazy::LazyCache;

/// Name [`CacheManager::use_default`] installs its store under.
pub const DEFAULT_STORE: &str = "default";

/// Registry of named cache stores
///
/// Stores are either added already open or deferred: a deferred store is
/// opened through the driver registry the first time it is looked up, then
/// kept as a regular store. The manager is itself a cache that forwards to
/// its default store.
pub struct CacheManager {
    stores: DashMap<String, Arc<dyn CacheBackend>>,
    deferred: DashMap<String, Arc<LazyCache>>,
    default_store: RwLock<Option<String>>,
    use_default: Once,
    registry: Arc<DriverRegistry>,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    /// Create a manager resolving deferred stores through the global registry
    pub fn new() -> Self {
        Self::with_registry(DriverRegistry::global().clone())
    }

    /// Create a manager resolving deferred stores through `registry`
    pub fn with_registry(registry: Arc<DriverRegistry>) -> Self {
        Self {
            stores: DashMap::new(),
            deferred: DashMap::new(),
            default_store: RwLock::new(None),
            use_default: Once::new(),
            registry,
        }
    }

    /// Register an open store under `name`, replacing any previous one
    pub fn add_store(&self, name: impl Into<String>, store: Arc<dyn CacheBackend>) {
        let name = name.into();
        self.deferred.remove(&name);
        self.stores.insert(name, store);
    }

    /// Register a store opened on first lookup
    ///
    /// The driver is taken from the config's `driver` option.
    pub fn add_deferred_store(&self, name: impl Into<String>, config: DriverConfig) {
        let name = name.into();
        self.stores.remove(&name);
        self.deferred.insert(
            name,
            Arc::new(LazyCache::from_config_in(config, self.registry.clone())),
        );
    }

    /// Whether `name` is registered, open or deferred
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name) || self.deferred.contains_key(name)
    }

    /// Names of every registered store, sorted
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stores
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.deferred.iter().map(|entry| entry.key().clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Look up a store, opening it if it was deferred
    ///
    /// Fails with [`CacheError::StoreNotConfigured`] if `name` is unknown, or
    /// with the open error of a deferred store.
    pub fn try_store(&self, name: &str) -> Result<Arc<dyn CacheBackend>> {
        if let Some(store) = self.stores.get(name) {
            return Ok(store.value().clone());
        }

        let lazy = self
            .deferred
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CacheError::StoreNotConfigured(name.to_string()))?;

        let store = lazy.resolve()?;
        debug!(store = name, "materialized deferred cache store");

        // a concurrent add_store for the same name wins
        let store = self
            .stores
            .entry(name.to_string())
            .or_insert(store)
            .value()
            .clone();
        self.deferred
            .remove_if(name, |_, pending| Arc::ptr_eq(pending, &lazy));
        Ok(store)
    }

    /// Look up a store that must exist
    ///
    /// # Panics
    ///
    /// Panics with the [`try_store`](Self::try_store) error.
    pub fn store(&self, name: &str) -> Arc<dyn CacheBackend> {
        match self.try_store(name) {
            Ok(store) => store,
            Err(err) => panic!("{err}"),
        }
    }

    /// Look up `name`, falling back to the default store on any failure
    ///
    /// # Panics
    ///
    /// Panics if the fallback is needed and the default store cannot be
    /// resolved.
    pub fn store_or_default(&self, name: &str) -> Arc<dyn CacheBackend> {
        match self.try_store(name) {
            Ok(store) => store,
            Err(err) => {
                debug!(store = name, error = %err, "falling back to default cache store");
                match self.try_default() {
                    Ok(store) => store,
                    Err(err) => panic!("{err}"),
                }
            }
        }
    }

    /// Name the store used as fallback and for the manager's own cache
    /// operations. Existence is checked on use, not here.
    pub fn set_default_store(&self, name: impl Into<String>) {
        *self.default_store.write() = Some(name.into());
    }

    /// Install `store` as the default cache, once
    ///
    /// The store is added under [`DEFAULT_STORE`] and becomes the default
    /// store unless one is already named. Later calls are ignored.
    pub fn use_default(&self, store: Arc<dyn CacheBackend>) -> &Self {
        self.use_default.call_once(|| {
            self.add_store(DEFAULT_STORE, store);
            let mut default_store = self.default_store.write();
            if default_store.is_none() {
                *default_store = Some(DEFAULT_STORE.to_string());
            }
        });
        self
    }

    /// Current default store name
    pub fn default_store(&self) -> Option<String> {
        self.default_store.read().clone()
    }

    fn try_default(&self) -> Result<Arc<dyn CacheBackend>> {
        let name = self
            .default_store()
            .ok_or_else(|| CacheError::Config("no default cache store set".into()))?;
        self.try_store(&name)
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("stores", &self.store_names())
            .field("default_store", &self.default_store())
            .finish()
    }
}

#[async_trait]
impl CacheBackend for CacheManager {
    async fn get(&self, key: &str) -> Result<String> {
        self.try_default()?.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.try_default()?.set(key, value, ttl).await
    }

    async fn has(&self, key: &str) -> bool {
        match self.try_default() {
            Ok(store) => store.has(key).await,
            Err(err) => {
                warn!(key, error = %err, "default cache store unavailable");
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.try_default()?.delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        self.try_default()?.clear().await
    }

    async fn load(&self, key: &str, loader: Loader, ttl: Duration) -> Result<String> {
        self.try_default()?.load(key, loader, ttl).await
    }
}
