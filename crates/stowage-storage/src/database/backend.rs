//! Relational cache backend on SQLite
//!
//! Rows live in a shared table keyed by `<prefix>:<key>`. Statements run on
//! the blocking pool since `rusqlite` is synchronous.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use stowage_core::{
    CacheBackend, CacheError, KEY_SEPARATOR, Result, effective_ttl, expiry_after,
};

use super::config::DatabaseConfig;
use super::model::{CacheRow, schema, to_millis};
use crate::sweeper::Sweeper;

/// Shared SQLite connection handed to the backend
pub type DbHandle = Arc<Mutex<Connection>>;

/// SQL access shared by the handle and the sweep task.
#[derive(Debug)]
struct SqlStore {
    db: DbHandle,
    table: String,
    prefix: String,
    expire: Duration,
}

impl SqlStore {
    fn key_for(&self, key: &str) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.prefix, key)
    }

    /// Live value for `key`; an expired row is deleted on the way out.
    fn get(&self, key: &str) -> rusqlite::Result<Option<String>> {
        let conn = self.db.lock();
        let row = conn
            .query_row(
                &format!(
                    r#"SELECT {} FROM "{}" WHERE "key" = ?1"#,
                    CacheRow::COLUMNS,
                    self.table
                ),
                params![key],
                CacheRow::from_row,
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };
        let now = to_millis(SystemTime::now());
        if !row.is_expired_at(now) {
            return Ok(Some(row.value));
        }

        // guarded on expiry so a concurrent fresh write survives
        match conn.execute(
            &format!(r#"DELETE FROM "{}" WHERE "key" = ?1 AND "expire" <= ?2"#, self.table),
            params![row.key, now],
        ) {
            Ok(_) => debug!(key = %row.key, "removed expired cache row"),
            Err(err) => {
                warn!(key = %row.key, error = %err, "failed to remove expired cache row");
            }
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: &str, deadline: SystemTime) -> rusqlite::Result<()> {
        self.db.lock().execute(
            &format!(
                r#"INSERT INTO "{}" ({}) VALUES (?1, ?2, ?3)
                ON CONFLICT("key") DO UPDATE
                SET "value" = excluded."value", "expire" = excluded."expire""#,
                self.table,
                CacheRow::COLUMNS
            ),
            params![key, value, to_millis(deadline)],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> rusqlite::Result<()> {
        self.db.lock().execute(
            &format!(r#"DELETE FROM "{}" WHERE "key" = ?1"#, self.table),
            params![key],
        )?;
        Ok(())
    }

    /// Delete every row under this prefix.
    ///
    /// Compares a literal prefix instead of `LIKE`, whose `%` and `_`
    /// wildcards could match another instance's keys.
    fn clear(&self) -> rusqlite::Result<usize> {
        let scope = format!("{}{KEY_SEPARATOR}", self.prefix);
        self.db.lock().execute(
            &format!(
                r#"DELETE FROM "{}" WHERE substr("key", 1, length(?1)) = ?1"#,
                self.table
            ),
            params![scope],
        )
    }

    fn sweep(&self) -> rusqlite::Result<usize> {
        self.db.lock().execute(
            &format!(r#"DELETE FROM "{}" WHERE "expire" <= ?1"#, self.table),
            params![to_millis(SystemTime::now())],
        )
    }
}

/// Run `f` against the store on the blocking pool.
async fn blocking<T, F>(
    store: &Arc<SqlStore>,
    operation: &'static str,
    key: &str,
    f: F,
) -> Result<T>
where
    F: FnOnce(&SqlStore) -> rusqlite::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| CacheError::backend(operation, key, e))?
        .map_err(|e| CacheError::backend(operation, key, e))
}

/// Relational cache backend
///
/// Several backends may share one table as long as their prefixes differ.
#[derive(Clone)]
pub struct DatabaseBackend {
    store: Arc<SqlStore>,
    sweeper: Arc<Sweeper>,
}

impl DatabaseBackend {
    /// Create the backend, creating its table if needed, and start the sweep.
    pub fn new(db: DbHandle, config: DatabaseConfig) -> Result<Self> {
        let config = config.normalized()?;
        db.lock()
            .execute_batch(&schema(&config.table_name))
            .map_err(|e| {
                CacheError::Connection(format!("creating table {}: {e}", config.table_name))
            })?;

        let store = Arc::new(SqlStore {
            db,
            table: config.table_name,
            prefix: config.prefix,
            expire: config.expire,
        });

        let swept = store.clone();
        let sweeper = Sweeper::spawn("database", config.sweep_interval, move || {
            let store = swept.clone();
            async move { blocking(&store, "sweep", "*", |store| store.sweep()).await }
        });

        Ok(Self {
            store,
            sweeper: Arc::new(sweeper),
        })
    }

    /// Table holding this backend's rows
    pub fn table(&self) -> &str {
        &self.store.table
    }

    /// Whether the background sweep is still running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Stop the background sweep; lazy expiry on read keeps working.
    pub fn shutdown(&self) {
        self.sweeper.shutdown();
    }

    /// Delete every expired row in the table now.
    pub async fn sweep(&self) -> Result<usize> {
        blocking(&self.store, "sweep", "*", |store| store.sweep()).await
    }
}

impl std::fmt::Debug for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseBackend")
            .field("table", &self.store.table)
            .field("prefix", &self.store.prefix)
            .field("expire", &self.store.expire)
            .finish()
    }
}

#[async_trait]
impl CacheBackend for DatabaseBackend {
    async fn get(&self, key: &str) -> Result<String> {
        let full = self.store.key_for(key);
        blocking(&self.store, "get", key, move |store| store.get(&full))
            .await?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let full = self.store.key_for(key);
        let value = value.to_string();
        let deadline = expiry_after(effective_ttl(ttl, self.store.expire));
        blocking(&self.store, "set", key, move |store| store.set(&full, &value, deadline)).await
    }

    async fn has(&self, key: &str) -> bool {
        let full = self.store.key_for(key);
        match blocking(&self.store, "has", key, move |store| store.get(&full)).await {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(key, error = %err, "database cache lookup failed");
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full = self.store.key_for(key);
        blocking(&self.store, "delete", key, move |store| store.delete(&full)).await
    }

    async fn clear(&self) -> Result<()> {
        let removed = blocking(&self.store, "clear", "*", |store| store.clear()).await?;
        debug!(prefix = %self.store.prefix, removed, "cleared database cache");
        Ok(())
    }
}
