//! Relational backend configuration

use serde::Deserialize;
use std::time::Duration;

use stowage_core::config::de;
use stowage_core::{CacheError, DEFAULT_EXPIRE, DEFAULT_PREFIX, Result, validate_prefix};

/// Configuration for the relational backend
///
/// The connection itself travels as a resource, see
/// [`DB_RESOURCE`](super::DB_RESOURCE).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Key prefix scoping this instance (default: `"cache"`)
    pub prefix: String,
    /// TTL applied when `set` receives a zero TTL (default: 72h)
    #[serde(deserialize_with = "de::duration")]
    pub expire: Duration,
    /// Table holding the rows (default: `"caches"`)
    #[serde(alias = "table_name", alias = "table")]
    pub table_name: String,
    /// Pause between expired-row deletes (default: 60s)
    #[serde(deserialize_with = "de::duration")]
    pub sweep_interval: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            expire: DEFAULT_EXPIRE,
            table_name: "caches".to_string(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl DatabaseConfig {
    /// Set the key prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the default TTL
    pub fn with_expire(mut self, expire: Duration) -> Self {
        self.expire = expire;
        self
    }

    /// Set the table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table_name = table.into();
        self
    }

    /// Set the background sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Replace zero and empty values with defaults, then check the prefix and
    /// the table name.
    pub(crate) fn normalized(mut self) -> Result<Self> {
        let defaults = Self::default();
        if self.prefix.is_empty() {
            self.prefix = defaults.prefix;
        }
        if self.expire.is_zero() {
            self.expire = defaults.expire;
        }
        if self.table_name.is_empty() {
            self.table_name = defaults.table_name;
        }
        if self.sweep_interval.is_zero() {
            self.sweep_interval = defaults.sweep_interval;
        }

        validate_prefix(&self.prefix)?;

        // the table name is interpolated into SQL
        let valid = self
            .table_name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && self
                .table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(CacheError::Config(format!(
                "invalid table name \"{}\"",
                self.table_name
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::DriverConfig;

    #[test]
    fn test_table_aliases() {
        for key in ["tableName", "table_name", "table"] {
            let config: DatabaseConfig =
                DriverConfig::new().with(key, "test_caches").decode().unwrap();
            assert_eq!(config.table_name, "test_caches");
        }
    }

    #[test]
    fn test_defaults() {
        let config: DatabaseConfig = DriverConfig::new().decode().unwrap();
        let config = config.normalized().unwrap();
        assert_eq!(config.prefix, "cache");
        assert_eq!(config.table_name, "caches");
        assert_eq!(config.expire, DEFAULT_EXPIRE);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let err = DatabaseConfig::default()
            .with_table("caches; DROP TABLE users")
            .normalized()
            .unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));

        assert!(DatabaseConfig::default().with_table("1caches").normalized().is_err());
        assert!(DatabaseConfig::default().with_table("_cache_2").normalized().is_ok());
    }

    #[test]
    fn test_rejects_nested_prefix() {
        let err = DatabaseConfig::default().with_prefix("a:b").normalized().unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }
}
