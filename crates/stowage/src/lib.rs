//! stowage: Backend-agnostic caching for Rust
//!
//! # Features
//!
//! - **One contract, four stores**: in-process memory, filesystem, SQLite and Redis
//! - **Identical expiry semantics** across stores, with lazy removal on read
//!   and background sweeps where the medium needs them
//! - **Driver registry** turning a name plus configuration into a live store
//! - **Typed wrapper** with a pluggable codec (JSON by default)
//! - **Cache manager** with named and deferred stores
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use stowage::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     stowage::register_default_drivers();
//!
//!     let cache = stowage::open("memory", &DriverConfig::new().with("expire", "10m"))?;
//!     cache.set("greeting", "hello", Duration::ZERO).await?;
//!     assert_eq!(cache.get("greeting").await?, "hello");
//!
//!     let counts = TypedCache::<u32>::new(cache);
//!     let hits = counts.load("hits", || async { Ok(1) }, Duration::from_secs(60)).await?;
//!     println!("hits: {hits}");
//!
//!     Ok(())
//! }
//! ```

use std::sync::Once;

mod manager;
mod typed;

// Re-export core
pub use stowage_core::*;
pub use stowage_core::registry::{drivers, open, register};

// Re-export storage
pub use stowage_storage as storage;

#[cfg(feature = "memory")]
pub use stowage_storage::{MemoryBackend, MemoryConfig, MemoryDriver};

#[cfg(feature = "file")]
pub use stowage_storage::{FileBackend, FileConfig, FileDriver};

#[cfg(feature = "database")]
pub use stowage_storage::{DatabaseBackend, DatabaseConfig, DatabaseDriver, DbHandle};

#[cfg(feature = "redis")]
pub use stowage_storage::{RedisBackend, RedisConfig, RedisDriver, RedisPool};

pub use manager::{CacheManager, DEFAULT_STORE, LazyCache};
pub use typed::{Decoder, Encoder, TypedCache, TypedOptions, open_typed};

static REGISTER_DEFAULTS: Once = Once::new();

/// Register the driver of every enabled backend in the global registry.
///
/// Safe to call any number of times; drivers already registered under their
/// default name are left alone.
pub fn register_default_drivers() {
    REGISTER_DEFAULTS.call_once(|| {
        let registry = DriverRegistry::global();

        #[cfg(feature = "memory")]
        if !registry.contains(stowage_storage::memory::DRIVER_NAME) {
            stowage_storage::memory::register();
        }
        #[cfg(feature = "file")]
        if !registry.contains(stowage_storage::file::DRIVER_NAME) {
            stowage_storage::file::register();
        }
        #[cfg(feature = "database")]
        if !registry.contains(stowage_storage::database::DRIVER_NAME) {
            stowage_storage::database::register();
        }
        #[cfg(feature = "redis")]
        if !registry.contains(stowage_storage::redis::DRIVER_NAME) {
            stowage_storage::redis::register();
        }

        tracing::debug!(drivers = ?registry.drivers(), "registered default cache drivers");
    });
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CacheBackend, CacheError, CacheManager, DriverConfig, JsonSerializer, LazyCache, Result,
        Serializer, TypedCache, TypedOptions, loader, open_typed, register_default_drivers,
    };

    #[cfg(feature = "memory")]
    pub use crate::{MemoryBackend, MemoryConfig};

    #[cfg(feature = "file")]
    pub use crate::{FileBackend, FileConfig};

    #[cfg(feature = "database")]
    pub use crate::{DatabaseBackend, DatabaseConfig};

    #[cfg(feature = "redis")]
    pub use crate::{RedisBackend, RedisConfig};
}
