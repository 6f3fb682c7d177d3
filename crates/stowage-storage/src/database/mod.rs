//! Relational cache backend on SQLite

mod backend;
mod config;
mod model;

pub use backend::{DatabaseBackend, DbHandle};
pub use config::DatabaseConfig;

use parking_lot::Mutex;
use std::sync::Arc;

pub use rusqlite::Connection;

use stowage_core::{CacheBackend, CacheError, Driver, DriverConfig, Result};

/// Name the relational driver registers under.
pub const DRIVER_NAME: &str = "database";

/// Resource key carrying the [`DbHandle`].
pub const DB_RESOURCE: &str = "db";

/// Wrap a connection so several backends can share it.
pub fn handle(conn: Connection) -> DbHandle {
    Arc::new(Mutex::new(conn))
}

/// Driver opening [`DatabaseBackend`]s
///
/// Requires a [`DbHandle`] resource under `db`. Recognized options:
/// `prefix`, `expire`, `tableName` (or `table_name`, `table`),
/// `sweepInterval`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseDriver;

impl Driver for DatabaseDriver {
    fn open(&self, config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
        let db: DbHandle = config
            .resource(DB_RESOURCE)
            .ok_or_else(|| CacheError::Config("db is required".into()))?;
        let settings: DatabaseConfig = config.decode()?;
        Ok(Arc::new(DatabaseBackend::new(db, settings)?))
    }
}

/// Register the relational driver in the process-wide registry.
pub fn register() {
    stowage_core::registry::register(DRIVER_NAME, DatabaseDriver);
}

/// Open a relational store from a configuration map.
pub fn open(config: &DriverConfig) -> Result<Arc<dyn CacheBackend>> {
    DatabaseDriver.open(config)
}
