//! Driver trait: turns configuration into a live cache

use std::sync::Arc;

use crate::{CacheBackend, DriverConfig, Result};

/// Factory producing a cache store from a configuration map
///
/// Each storage backend ships one implementation and registers it under its
/// driver name. Closures with the matching signature are drivers too.
pub trait Driver: Send + Sync + 'static {
    /// Open a new store from `config`
    fn open(&self, config: &DriverConfig) -> Result<Arc<dyn CacheBackend>>;
}

impl<F> Driver for F
where
    F: Fn(&DriverConfig) -> Result<Arc<dyn CacheBackend>> + Send + Sync + 'static,
{
    fn open(&self, config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
        self(config)
    }
}
