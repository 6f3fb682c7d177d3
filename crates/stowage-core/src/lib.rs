//! stowage-core: Core contract and types for the stowage library
//!
//! This crate provides the cache contract every storage backend implements,
//! the error taxonomy, the text codec, the driver configuration map and the
//! driver registry that turns a name plus configuration into a live cache.

pub mod config;
mod error;
pub mod registry;
mod traits;
mod types;

pub use config::DriverConfig;
pub use error::{CacheError, Result};
pub use registry::DriverRegistry;
pub use traits::*;
pub use types::*;
