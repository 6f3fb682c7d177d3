//! Typed cache wrapper
//!
//! [`TypedCache`] layers an encoder and a decoder over any string store so
//! callers work with `T` directly. JSON is the default codec.

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use stowage_core::{
    CacheBackend, CacheError, DriverConfig, JsonSerializer, Result, Serializer, loader, registry,
};

/// Turns a value into its stored form.
pub type Encoder<T> = Arc<dyn Fn(&T) -> Result<String> + Send + Sync>;

/// Turns a stored payload back into a value.
pub type Decoder<T> = Arc<dyn Fn(&str) -> Result<T> + Send + Sync>;

/// Codec overrides for a [`TypedCache`]
///
/// Unset halves fall back to JSON.
pub struct TypedOptions<T> {
    encoder: Option<Encoder<T>>,
    decoder: Option<Decoder<T>>,
}

impl<T> Default for TypedOptions<T> {
    fn default() -> Self {
        Self {
            encoder: None,
            decoder: None,
        }
    }
}

impl<T: 'static> TypedOptions<T> {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the encoder
    pub fn encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&T) -> Result<String> + Send + Sync + 'static,
    {
        self.encoder = Some(Arc::new(encoder));
        self
    }

    /// Override the decoder
    pub fn decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(&str) -> Result<T> + Send + Sync + 'static,
    {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Encode and decode with any [`Serializer`]
    pub fn serializer<S>(self, serializer: S) -> Self
    where
        S: Serializer,
        T: Serialize + DeserializeOwned,
    {
        let decoding = serializer.clone();
        self.encoder(move |value| serializer.serialize(value))
            .decoder(move |payload| decoding.deserialize(payload))
    }
}

impl TypedOptions<String> {
    /// Store strings verbatim instead of as JSON string literals
    pub fn for_string() -> Self {
        Self::new()
            .encoder(|value: &String| Ok(value.clone()))
            .decoder(|payload| Ok(payload.to_string()))
    }
}

/// A cache of `T` values over a string store
pub struct TypedCache<T> {
    cache: Arc<dyn CacheBackend>,
    encoder: Encoder<T>,
    decoder: Decoder<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCache<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            encoder: self.encoder.clone(),
            decoder: self.decoder.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> TypedCache<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Wrap `cache` with the JSON codec
    pub fn new(cache: Arc<dyn CacheBackend>) -> Self {
        Self::with_options(cache, TypedOptions::default())
    }

    /// Wrap `cache`, applying codec overrides
    pub fn with_options(cache: Arc<dyn CacheBackend>, options: TypedOptions<T>) -> Self {
        let encoder = options
            .encoder
            .unwrap_or_else(|| Arc::new(|value: &T| JsonSerializer.serialize(value)));
        let decoder = options
            .decoder
            .unwrap_or_else(|| Arc::new(|payload: &str| JsonSerializer.deserialize(payload)));
        Self::with_codec(cache, encoder, decoder)
    }
}

impl TypedCache<String> {
    /// Wrap `cache`, storing strings verbatim
    pub fn raw(cache: Arc<dyn CacheBackend>) -> Self {
        Self::with_options(cache, TypedOptions::for_string())
    }
}

impl<T: Send + 'static> TypedCache<T> {
    /// Wrap `cache` with an explicit codec
    ///
    /// Unlike [`TypedCache::new`], `T` needs no serde bounds.
    pub fn with_codec(
        cache: Arc<dyn CacheBackend>,
        encoder: Encoder<T>,
        decoder: Decoder<T>,
    ) -> Self {
        Self {
            cache,
            encoder,
            decoder,
            _marker: PhantomData,
        }
    }

    /// The wrapped string store
    pub fn inner(&self) -> &Arc<dyn CacheBackend> {
        &self.cache
    }

    /// Get and decode a value
    ///
    /// A payload that fails to decode is a
    /// [`CacheError::Decoding`], never a
    /// miss.
    pub async fn get(&self, key: &str) -> Result<T> {
        let payload = self.cache.get(key).await?;
        (self.decoder)(&payload)
    }

    /// Encode and store a value; nothing is written if encoding fails
    pub async fn set(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let payload = (self.encoder)(value)?;
        self.cache.set(key, &payload, ttl).await
    }

    /// Typed cache-aside read
    ///
    /// A hit is decoded. On a miss `f` runs once, its value is encoded once,
    /// stored and handed back without being decoded again.
    pub async fn load<F, Fut>(&self, key: &str, f: F, ttl: Duration) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let produced: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
        let slot = produced.clone();
        let encoder = self.encoder.clone();

        let payload = self
            .cache
            .load(
                key,
                loader(move || async move {
                    let value = f().await?;
                    let payload = encoder(&value)?;
                    *slot.lock() = Some(value);
                    Ok::<_, CacheError>(payload)
                }),
                ttl,
            )
            .await?;

        let fresh = produced.lock().take();
        match fresh {
            Some(value) => Ok(value),
            None => (self.decoder)(&payload),
        }
    }

    /// Check if an unexpired entry exists
    pub async fn has(&self, key: &str) -> bool {
        self.cache.has(key).await
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.cache.delete(key).await
    }

    /// Clear the wrapped store
    pub async fn clear(&self) -> Result<()> {
        self.cache.clear().await
    }
}

/// Open `driver` through the process-wide registry and wrap it as a
/// [`TypedCache`].
pub fn open_typed<T>(
    driver: &str,
    config: &DriverConfig,
    options: TypedOptions<T>,
) -> Result<TypedCache<T>>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let cache = registry::open(driver, config)?;
    Ok(TypedCache::with_options(cache, options))
}

impl<T> std::fmt::Debug for TypedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("type", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stowage_storage::{MemoryBackend, MemoryConfig};

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    fn store() -> Arc<dyn CacheBackend> {
        Arc::new(MemoryBackend::new(MemoryConfig::default()))
    }

    fn alice() -> User {
        User {
            id: 1,
            name: "alice".into(),
        }
    }

    #[tokio::test]
    async fn test_json_round_trip_through_store() {
        let inner = store();
        let users = TypedCache::<User>::new(inner.clone());

        users.set("user:1", &alice(), Duration::ZERO).await.unwrap();
        assert_eq!(users.get("user:1").await.unwrap(), alice());
        assert_eq!(inner.get("user:1").await.unwrap(), r#"{"id":1,"name":"alice"}"#);
    }

    #[tokio::test]
    async fn test_decode_failure_is_not_a_miss() {
        let inner = store();
        inner.set("user:1", "not json", Duration::ZERO).await.unwrap();

        let users = TypedCache::<User>::new(inner);
        let err = users.get("user:1").await.unwrap_err();
        assert!(matches!(err, CacheError::Decoding(_)));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let users = TypedCache::<User>::new(store());
        assert!(users.get("user:404").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_encode_failure_skips_write() {
        let inner = store();
        let users = TypedCache::with_options(
            inner.clone(),
            TypedOptions::<User>::new().encoder(|_| Err(CacheError::Encoding("refused".into()))),
        );

        let err = users.set("user:1", &alice(), Duration::ZERO).await.unwrap_err();
        assert_eq!(err, CacheError::Encoding("refused".into()));
        assert!(!inner.has("user:1").await);
    }

    #[tokio::test]
    async fn test_for_string_stores_verbatim() {
        let inner = store();
        let raw = TypedCache::raw(inner.clone());
        raw.set("greeting", &"hello".to_string(), Duration::ZERO).await.unwrap();
        assert_eq!(inner.get("greeting").await.unwrap(), "hello");

        let json = TypedCache::<String>::new(inner.clone());
        json.set("quoted", &"hello".to_string(), Duration::ZERO).await.unwrap();
        assert_eq!(inner.get("quoted").await.unwrap(), r#""hello""#);
    }

    #[tokio::test]
    async fn test_load_miss_then_hit() {
        let users = TypedCache::<User>::new(store());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let user = users
                .load(
                    "user:1",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(alice())
                    },
                    Duration::ZERO,
                )
                .await
                .unwrap();
            assert_eq!(user, alice());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_miss_does_not_decode() {
        let decodes = Arc::new(AtomicUsize::new(0));
        let counter = decodes.clone();
        let users = TypedCache::with_options(
            store(),
            TypedOptions::<User>::new().decoder(move |payload| {
                counter.fetch_add(1, Ordering::SeqCst);
                JsonSerializer.deserialize(payload)
            }),
        );

        users.load("user:1", || async { Ok(alice()) }, Duration::ZERO).await.unwrap();
        assert_eq!(decodes.load(Ordering::SeqCst), 0);

        users.load("user:1", || async { Ok(alice()) }, Duration::ZERO).await.unwrap();
        assert_eq!(decodes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_failure_writes_nothing() {
        let inner = store();
        let users = TypedCache::<User>::new(inner.clone());

        let err = users
            .load(
                "user:1",
                || async { Err(CacheError::loader("upstream down")) },
                Duration::ZERO,
            )
            .await
            .unwrap_err();
        assert_eq!(err, CacheError::Loader("upstream down".into()));
        assert!(!inner.has("user:1").await);
    }

    #[tokio::test]
    async fn test_passthrough_ops() {
        let users = TypedCache::<User>::new(store());
        users.set("user:1", &alice(), Duration::ZERO).await.unwrap();
        users.set("user:2", &alice(), Duration::ZERO).await.unwrap();
        assert!(users.has("user:1").await);

        users.delete("user:1").await.unwrap();
        assert!(!users.has("user:1").await);

        users.clear().await.unwrap();
        assert!(!users.has("user:2").await);
    }

    #[tokio::test]
    async fn test_serializer_option() {
        let options = TypedOptions::<User>::new().serializer(JsonSerializer);
        let users = TypedCache::with_options(store(), options);
        users.set("user:1", &alice(), Duration::ZERO).await.unwrap();
        assert_eq!(users.get("user:1").await.unwrap(), alice());
    }
}
