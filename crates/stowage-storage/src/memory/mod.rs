//! In-memory cache backend

mod backend;

pub use backend::{MemoryBackend, MemoryConfig};

use std::sync::Arc;

use stowage_core::{CacheBackend, Driver, DriverConfig, Result};

/// Name the memory driver registers under.
pub const DRIVER_NAME: &str = "memory";

/// Driver opening [`MemoryBackend`]s
///
/// Recognized options: `expire`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryDriver;

impl Driver for MemoryDriver {
    fn open(&self, config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
        let config: MemoryConfig = config.decode()?;
        Ok(Arc::new(MemoryBackend::new(config)))
    }
}

/// Register the memory driver in the process-wide registry.
pub fn register() {
    stowage_core::registry::register(DRIVER_NAME, MemoryDriver);
}

/// Open a memory store from a configuration map.
pub fn open(config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
    MemoryDriver.open(config)
}
