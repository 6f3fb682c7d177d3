//! Pluggable serialization trait

use crate::CacheError;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for pluggable text serialization formats
///
/// Payloads are stored as strings, so implementations must produce valid
/// UTF-8.
pub trait Serializer: Send + Sync + Clone + 'static {
    /// Name of the serializer (for debugging)
    fn name(&self) -> &str;

    /// Serialize a value to its stored form
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String, CacheError>;

    /// Deserialize a stored payload
    fn deserialize<T: DeserializeOwned>(&self, payload: &str) -> Result<T, CacheError>;
}

/// JSON serializer (default)
///
/// Human-readable, widely compatible, good for debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "json"
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<String, CacheError> {
        serde_json::to_string(value).map_err(|e| CacheError::Encoding(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, payload: &str) -> Result<T, CacheError> {
        serde_json::from_str(payload).map_err(|e| CacheError::Decoding(e.to_string()))
    }
}
