use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

use stowage_core::{CacheBackend, CacheError, KEY_SEPARATOR, Result, effective_ttl};

use super::config::RedisConfig;

/// Pooled Redis client shared by backends
pub type RedisPool = Pool<RedisConnectionManager>;

/// Keys fetched per SCAN round trip during `clear`.
const SCAN_COUNT: usize = 1000;

/// Redis backend implementation
///
/// Expiry is delegated to the server: every write carries a `PX` TTL.
#[derive(Clone)]
pub struct RedisBackend {
    pool: RedisPool,
    prefix: String,
    expire: Duration,
}

impl RedisBackend {
    /// Create a backend on an existing pool
    ///
    /// Fails if the prefix contains `:`, which would let it clear the keys
    /// of a nested prefix.
    pub fn new(pool: RedisPool, config: RedisConfig) -> Result<Self> {
        let config = config.normalized()?;
        Ok(Self {
            pool,
            prefix: config.prefix,
            expire: config.expire,
        })
    }

    /// Build a pool for `url` and create a backend on it
    pub async fn connect(url: &str, config: RedisConfig) -> Result<Self> {
        let config = config.normalized()?;
        let manager =
            RedisConnectionManager::new(url).map_err(|e| CacheError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Self::new(pool, config)
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.prefix, key)
    }

    /// SCAN pattern matching exactly this instance's keys.
    fn match_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 2);
        for c in self.prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push(KEY_SEPARATOR);
        pattern.push('*');
        pattern
    }

    async fn get_connection(&self) -> Result<PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("prefix", &self.prefix)
            .field("expire", &self.expire)
            .finish()
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<String> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn
            .get(self.prefixed_key(key))
            .await
            .map_err(|e| CacheError::backend("get", key, e))?;

        value.ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.get_connection().await?;
        // PX rejects zero
        let millis = effective_ttl(ttl, self.expire).as_millis().max(1);

        redis::cmd("SET")
            .arg(self.prefixed_key(key))
            .arg(value)
            .arg("PX")
            .arg(u64::try_from(millis).unwrap_or(u64::MAX))
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| CacheError::backend("set", key, e))
    }

    async fn has(&self, key: &str) -> bool {
        let result = match self.get_connection().await {
            Ok(mut conn) => conn
                .exists::<_, bool>(self.prefixed_key(key))
                .await
                .map_err(|e| CacheError::backend("has", key, e)),
            Err(err) => Err(err),
        };
        result.unwrap_or_else(|err| {
            warn!(key, error = %err, "redis cache lookup failed");
            false
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: usize = conn
            .del(self.prefixed_key(key))
            .await
            .map_err(|e| CacheError::backend("delete", key, e))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let pattern = self.match_pattern();

        let mut cursor = 0u64;
        let mut removed = 0usize;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut *conn)
                .await
                .map_err(|e| CacheError::backend("clear", &pattern, e))?;

            if !keys.is_empty() {
                removed += conn
                    .unlink::<_, usize>(&keys)
                    .await
                    .map_err(|e| CacheError::backend("clear", &pattern, e))?;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(prefix = %self.prefix, removed, "cleared redis cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::loader;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    async fn backend(prefix: &str) -> RedisBackend {
        let cache = RedisBackend::connect(&redis_url(), RedisConfig::default().prefix(prefix))
            .await
            .expect("redis must be reachable at REDIS_URL");
        cache.clear().await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_match_pattern_escapes_glob() {
        let manager = RedisConnectionManager::new("redis://127.0.0.1:6379").unwrap();
        let pool = Pool::builder().build_unchecked(manager);
        let cache = RedisBackend::new(pool, RedisConfig::default().prefix("a*b[1]")).unwrap();
        assert_eq!(cache.match_pattern(), r"a\*b\[1\]:*");
        assert_eq!(cache.prefixed_key("k"), "a*b[1]:k");
    }

    #[tokio::test]
    async fn test_rejects_nested_prefix() {
        let manager = RedisConnectionManager::new("redis://127.0.0.1:6379").unwrap();
        let pool = Pool::builder().build_unchecked(manager);

        let parent = RedisBackend::new(pool.clone(), RedisConfig::default().prefix("a")).unwrap();
        assert_eq!(parent.match_pattern(), "a:*");
        let err = RedisBackend::new(pool, RedisConfig::default().prefix("a:b")).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn test_get_set_delete() {
        let cache = backend("stowage-test-basic").await;

        assert!(cache.get("key").await.unwrap_err().is_not_found());
        cache.set("key", "value", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), "value");
        assert!(cache.has("key").await);

        cache.delete("key").await.unwrap();
        cache.delete("key").await.unwrap();
        assert!(!cache.has("key").await);
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn test_native_expiry() {
        let cache = backend("stowage-test-expiry").await;
        cache.set("a", "1", Duration::from_secs(1)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cache.get("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn test_clear_is_scoped_by_prefix() {
        let p1 = backend("stowage-p1").await;
        let p2 = backend("stowage-p2").await;

        p1.set("x", "1", Duration::ZERO).await.unwrap();
        p2.set("x", "2", Duration::ZERO).await.unwrap();
        p1.clear().await.unwrap();

        assert!(!p1.has("x").await);
        assert_eq!(p2.get("x").await.unwrap(), "2");
        p2.clear().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running redis server"]
    async fn test_load() {
        let cache = backend("stowage-test-load").await;

        let value = cache
            .load("key", loader(|| async { Ok("value".to_string()) }), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(value, "value");

        let value = cache
            .load("key", loader(|| async { Ok("value1".to_string()) }), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(value, "value");
        cache.clear().await.unwrap();
    }
}
