//! Driver configuration map
//!
//! A [`DriverConfig`] carries plain options (strings, numbers, durations) in a
//! JSON object and live handles (a database connection, a Redis pool) as
//! type-erased resources. Backends decode the plain part into their typed
//! config struct and pull resources out by key.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{CacheError, Result};

/// Option naming the driver a deferred store is opened with.
pub const DRIVER_KEY: &str = "driver";

/// Free-form configuration handed to a [`Driver`](crate::Driver)
#[derive(Clone, Default)]
pub struct DriverConfig {
    options: Map<String, Value>,
    resources: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl DriverConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration naming its driver
    pub fn for_driver(driver: impl Into<String>) -> Self {
        Self::new().with(DRIVER_KEY, driver.into())
    }

    /// Set a plain option
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a duration option, kept with millisecond precision
    pub fn with_duration(self, key: impl Into<String>, duration: Duration) -> Self {
        let millis = duration.as_millis().to_string() + "ms";
        self.with(key, millis)
    }

    /// Attach a live handle such as a connection or client
    pub fn with_resource<R>(mut self, key: impl Into<String>, resource: R) -> Self
    where
        R: Any + Send + Sync,
    {
        self.resources.insert(key.into(), Arc::new(resource));
        self
    }

    /// Set a plain option in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.options.insert(key.into(), value.into());
    }

    /// Read a plain option
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Driver name, if one was configured
    pub fn driver(&self) -> Option<&str> {
        self.options.get(DRIVER_KEY).and_then(Value::as_str)
    }

    /// Fetch a resource of type `R`; `None` if absent or of another type
    pub fn resource<R>(&self, key: &str) -> Option<R>
    where
        R: Any + Send + Sync + Clone,
    {
        self.resources
            .get(key)
            .and_then(|resource| resource.downcast_ref::<R>())
            .cloned()
    }

    /// Check whether a resource is attached under `key`
    pub fn has_resource(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    /// Decode the plain options into a typed config
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.options.clone()))
            .map_err(|e| CacheError::Config(e.to_string()))
    }
}

impl fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut resources: Vec<&String> = self.resources.keys().collect();
        resources.sort();
        f.debug_struct("DriverConfig")
            .field("options", &self.options)
            .field("resources", &resources)
            .finish()
    }
}

impl From<Map<String, Value>> for DriverConfig {
    fn from(options: Map<String, Value>) -> Self {
        Self {
            options,
            resources: HashMap::new(),
        }
    }
}

/// Deserializers for the loosely typed values found in config maps
pub mod de {
    use std::time::Duration;

    use serde::de::{self, Deserializer, Unexpected, Visitor};

    /// Parse a duration written as `"1h30m"`, `"1500ms"`, `"72h"` or a bare
    /// number of seconds. Negative amounts collapse to zero.
    pub fn parse_duration(input: &str) -> Option<Duration> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if let Some(rest) = input.strip_prefix('-') {
            return parse_duration(rest).map(|_| Duration::ZERO);
        }
        if let Ok(secs) = input.parse::<f64>() {
            return Duration::try_from_secs_f64(secs).ok();
        }

        let mut total = Duration::ZERO;
        let mut rest = input;
        while !rest.is_empty() {
            let digits = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .unwrap_or(rest.len());
            if digits == 0 {
                return None;
            }
            let amount: f64 = rest[..digits].parse().ok()?;
            rest = &rest[digits..];
            let unit_len = rest
                .find(|c: char| c.is_ascii_digit())
                .unwrap_or(rest.len());
            let scale = match rest[..unit_len].trim() {
                "ms" => 0.001,
                "s" => 1.0,
                "m" => 60.0,
                "h" => 3600.0,
                "d" => 86_400.0,
                _ => return None,
            };
            total += Duration::try_from_secs_f64(amount * scale).ok()?;
            rest = &rest[unit_len..];
        }
        Some(total)
    }

    /// Parse a Unix permission mode written as `"0755"`, `"0o755"` or `"755"`.
    pub fn parse_mode(input: &str) -> Option<u32> {
        let input = input.trim();
        let digits = input.strip_prefix("0o").unwrap_or(input);
        u32::from_str_radix(digits, 8).ok()
    }

    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("seconds or a duration string such as \"72h\"")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v.max(0) as u64))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Duration, E> {
            Ok(Duration::try_from_secs_f64(v.max(0.0)).unwrap_or(Duration::ZERO))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            parse_duration(v).ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    /// `deserialize_with` adapter for [`Duration`] fields.
    pub fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct ModeVisitor;

    impl Visitor<'_> for ModeVisitor {
        type Value = u32;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a permission mode such as 493 or \"0755\"")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
            u32::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u32, E> {
            u32::try_from(v).map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u32, E> {
            parse_mode(v).ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    /// `deserialize_with` adapter for file permission fields.
    pub fn mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        deserializer.deserialize_any(ModeVisitor)
    }
}
