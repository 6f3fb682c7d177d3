//! Filesystem cache backend

mod backend;
mod config;

pub use backend::FileBackend;
pub use config::FileConfig;

use std::sync::Arc;

use stowage_core::{CacheBackend, Driver, DriverConfig, Result};

/// Name the filesystem driver registers under.
pub const DRIVER_NAME: &str = "file";

/// Driver opening [`FileBackend`]s
///
/// Recognized options: `storagePath`, `prefix`, `expire`, `dirMode`,
/// `fileMode`, `sweepInterval`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDriver;

impl Driver for FileDriver {
    fn open(&self, config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
        let config: FileConfig = config.decode()?;
        Ok(Arc::new(FileBackend::new(config)?))
    }
}

/// Register the filesystem driver in the process-wide registry.
pub fn register() {
    stowage_core::registry::register(DRIVER_NAME, FileDriver);
}

/// Open a filesystem store from a configuration map.
pub fn open(config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
    FileDriver.open(config)
}
