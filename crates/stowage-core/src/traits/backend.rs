//! Cache backend trait

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::Result;

/// Value producer invoked by [`CacheBackend::load`] on a miss.
pub type Loader = Box<dyn FnOnce() -> BoxFuture<'static, Result<String>> + Send>;

/// Box an async closure into a [`Loader`].
///
/// ```
/// use stowage_core::{loader, CacheError};
///
/// let fetch = loader(|| async { Ok::<_, CacheError>("fresh".to_string()) });
/// # drop(fetch);
/// ```
pub fn loader<F, Fut>(f: F) -> Loader
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

/// Core contract shared by every cache store
///
/// Every implementation stores string payloads under string keys with a
/// per-entry absolute expiry. An entry is observable only while it is
/// unexpired; a `ttl` of zero means "use the store's default TTL", never
/// "keep forever".
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Get a value from the cache
    ///
    /// Fails with [`CacheError::NotFound`](crate::CacheError::NotFound) if the
    /// key doesn't exist or has expired.
    async fn get(&self, key: &str) -> Result<String>;

    /// Set a value, overwriting any existing entry for the key
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Check if an unexpired entry exists
    ///
    /// May remove a discovered-expired entry as a side effect. Backend
    /// failures are reported as `false`.
    async fn has(&self, key: &str) -> bool;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every entry owned by this instance
    ///
    /// Entries written by other instances sharing the same medium under a
    /// different prefix are left alone.
    async fn clear(&self) -> Result<()>;

    /// Cache-aside read
    ///
    /// Returns the stored value when present. Otherwise runs `loader` once,
    /// stores its output with `ttl` and returns it; a loader failure is
    /// propagated and nothing is written. Concurrent callers missing on the
    /// same key each run their own loader.
    async fn load(&self, key: &str, loader: Loader, ttl: Duration) -> Result<String> {
        match self.get(key).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
        let value = loader().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }
}

#[async_trait]
impl<T> CacheBackend for Arc<T>
where
    T: CacheBackend + ?Sized,
{
    async fn get(&self, key: &str) -> Result<String> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        (**self).set(key, value, ttl).await
    }

    async fn has(&self, key: &str) -> bool {
        (**self).has(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }

    async fn load(&self, key: &str, loader: Loader, ttl: Duration) -> Result<String> {
        (**self).load(key, loader, ttl).await
    }
}

/// Pick the TTL an entry is written with.
///
/// A zero TTL falls back to the store's configured default.
pub fn effective_ttl(ttl: Duration, default: Duration) -> Duration {
    if ttl.is_zero() { default } else { ttl }
}
