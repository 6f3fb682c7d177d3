//! Core traits for cache operations

mod backend;
mod driver;
mod serializer;

pub use backend::{CacheBackend, Loader, effective_ttl, loader};
pub use driver::Driver;
pub use serializer::{JsonSerializer, Serializer};
