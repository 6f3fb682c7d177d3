//! stowage-storage: Storage backends for stowage
//!
//! Each backend sits behind a cargo feature and ships a driver that can be
//! registered under its name (`memory`, `file`, `database`, `redis`).

#[cfg(any(feature = "file", feature = "database"))]
mod sweeper;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryBackend, MemoryConfig, MemoryDriver};

#[cfg(feature = "file")]
pub mod file;

#[cfg(feature = "file")]
pub use file::{FileBackend, FileConfig, FileDriver};

#[cfg(feature = "database")]
pub mod database;

#[cfg(feature = "database")]
pub use database::{DatabaseBackend, DatabaseConfig, DatabaseDriver, DbHandle};

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "redis")]
pub use redis::{RedisBackend, RedisConfig, RedisDriver, RedisPool};
