//! Core types for cache operations

mod entry;

pub use entry::{CacheEntry, expiry_after};

use std::time::Duration;

use crate::{CacheError, Result};

/// Default TTL applied when neither the caller nor the config sets one (72h).
pub const DEFAULT_EXPIRE: Duration = Duration::from_secs(72 * 60 * 60);

/// Default key namespace for shared-medium backends.
pub const DEFAULT_PREFIX: &str = "cache";

/// Joins a prefix to a key on media shared by several instances.
pub const KEY_SEPARATOR: char = ':';

/// Reject a prefix that could nest inside another instance's namespace.
///
/// Keys are stored as `<prefix>:<key>` and cleared by the `<prefix>:` scope,
/// so a prefix `a` would also clear everything stored under `a:b`.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.contains(KEY_SEPARATOR) {
        return Err(CacheError::Config(format!(
            "prefix \"{prefix}\" must not contain '{KEY_SEPARATOR}'"
        )));
    }
    Ok(())
}
