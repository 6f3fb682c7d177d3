//! Cache entry type

use std::time::{Duration, SystemTime};

/// Fallback horizon when `now + ttl` overflows the platform clock.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A stored value with its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The cached payload
    pub value: String,
    /// Instant from which the entry is treated as absent
    pub expires_at: SystemTime,
}

impl CacheEntry {
    /// Create an entry expiring `ttl` from now
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: expiry_after(ttl),
        }
    }

    /// Check if entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// Check expiry against a given clock reading
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    /// Get remaining TTL, `None` once expired
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .duration_since(SystemTime::now())
            .ok()
            .filter(|remaining| !remaining.is_zero())
    }
}

/// Absolute deadline `ttl` from now.
pub fn expiry_after(ttl: Duration) -> SystemTime {
    let now = SystemTime::now();
    now.checked_add(ttl).unwrap_or(now + FAR_FUTURE)
}
