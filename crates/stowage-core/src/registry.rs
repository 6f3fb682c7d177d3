//! Driver registry
//!
//! A name → [`Driver`] directory. The process-wide instance is populated by
//! explicit registration calls at startup (one per backend module); lookups
//! may then run concurrently from anywhere.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::{CacheBackend, CacheError, Driver, DriverConfig, Result};

static GLOBAL: LazyLock<Arc<DriverRegistry>> = LazyLock::new(|| Arc::new(DriverRegistry::new()));

/// Directory of named drivers guarded by a reader/writer lock
#[derive(Default)]
pub struct DriverRegistry {
    drivers: RwLock<BTreeMap<String, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static Arc<DriverRegistry> {
        &GLOBAL
    }

    /// Register `driver` under `name`
    ///
    /// # Panics
    ///
    /// Registering an empty name or a name that is already taken is a wiring
    /// defect and panics.
    pub fn register(&self, name: impl Into<String>, driver: impl Driver) {
        let name = name.into();
        if name.is_empty() {
            panic!("{}", CacheError::InvalidDriver("driver name is empty".into()));
        }

        let mut drivers = self.drivers.write();
        if drivers.contains_key(&name) {
            panic!("{}", CacheError::DuplicateDriver(name));
        }
        debug!(driver = %name, "registered cache driver");
        drivers.insert(name, Arc::new(driver));
    }

    /// Registered driver names, sorted
    pub fn drivers(&self) -> Vec<String> {
        self.drivers.read().keys().cloned().collect()
    }

    /// Check whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.read().contains_key(name)
    }

    /// Open a store through the driver registered under `name`
    pub fn open(&self, name: &str, config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
        let driver = self
            .drivers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownDriver(name.to_string()))?;

        debug!(driver = %name, "opening cache store");
        driver.open(config)
    }
}

/// Register a driver in the process-wide registry. See [`DriverRegistry::register`].
pub fn register(name: impl Into<String>, driver: impl Driver) {
    DriverRegistry::global().register(name, driver);
}

/// Driver names in the process-wide registry.
pub fn drivers() -> Vec<String> {
    DriverRegistry::global().drivers()
}

/// Open a store through the process-wide registry.
pub fn open(name: &str, config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
    DriverRegistry::global().open(name, config)
}
