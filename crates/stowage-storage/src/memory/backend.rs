//! In-memory cache backend using a mutex-guarded map

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use stowage_core::config::de;
use stowage_core::{CacheBackend, CacheEntry, CacheError, DEFAULT_EXPIRE, Result, effective_ttl};

/// Configuration for the memory backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryConfig {
    /// Default TTL for entries written with a zero TTL
    #[serde(deserialize_with = "de::duration")]
    pub expire: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            expire: DEFAULT_EXPIRE,
        }
    }
}

impl MemoryConfig {
    /// Create config with a specific default TTL
    pub fn with_expire(expire: Duration) -> Self {
        Self { expire }
    }
}

/// In-memory cache backend
///
/// A single lock guards the whole key space. Expired entries are dropped by
/// the read that discovers them; there is no background sweep.
/// Cloning creates a new handle to the SAME underlying store.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<Mutex<HashMap<String, CacheEntry>>>,
    expire: Duration,
}

impl MemoryBackend {
    /// Create a new memory backend
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            expire: effective_ttl(config.expire, DEFAULT_EXPIRE),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(MemoryConfig::default())
    }

    /// TTL used when `set` is called with a zero TTL
    pub fn default_ttl(&self) -> Duration {
        self.expire
    }

    /// Number of stored entries, including expired ones not yet reclaimed
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// Check if no entries are stored
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// Look up `key`, dropping it if it has expired.
    fn live_entry(&self, key: &str) -> Option<String> {
        let mut data = self.data.lock();
        match data.get(key) {
            Some(entry) if !entry.is_expired_at(SystemTime::now()) => Some(entry.value.clone()),
            Some(_) => {
                data.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<String> {
        self.live_entry(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, effective_ttl(ttl, self.expire));
        self.data.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn has(&self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.data.lock().clear();
        Ok(())
    }
}
