//! Filesystem backend configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use stowage_core::config::de;
use stowage_core::{CacheError, DEFAULT_EXPIRE, DEFAULT_PREFIX, Result};

/// Directory created under the OS cache dir when no storage path is set.
const APP_DIR: &str = "stowage";

/// Configuration for the filesystem backend
///
/// Zero or empty values fall back to their defaults when the backend is built.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileConfig {
    /// Directory holding the cache files (default: `<os cache dir>/stowage`)
    pub storage_path: PathBuf,
    /// File name prefix scoping this instance (default: `"cache"`)
    pub prefix: String,
    /// TTL applied when `set` receives a zero TTL (default: 72h)
    #[serde(deserialize_with = "de::duration")]
    pub expire: Duration,
    /// Permission bits for created directories (default: 0755)
    #[serde(deserialize_with = "de::mode")]
    pub dir_mode: u32,
    /// Permission bits for cache files (default: 0644)
    #[serde(deserialize_with = "de::mode")]
    pub file_mode: u32,
    /// Pause between background sweeps (default: 1s)
    #[serde(deserialize_with = "de::duration")]
    pub sweep_interval: Duration,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::new(),
            prefix: DEFAULT_PREFIX.to_string(),
            expire: DEFAULT_EXPIRE,
            dir_mode: 0o755,
            file_mode: 0o644,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

impl FileConfig {
    /// Create config storing files under `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: path.into(),
            ..Default::default()
        }
    }

    /// Set the file name prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the default TTL
    pub fn with_expire(mut self, expire: Duration) -> Self {
        self.expire = expire;
        self
    }

    /// Set the background sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Replace zero and empty values with defaults.
    pub(crate) fn normalized(mut self) -> Result<Self> {
        let defaults = Self::default();
        if self.storage_path.as_os_str().is_empty() {
            let base = dirs::cache_dir().ok_or_else(|| {
                CacheError::Config("no OS cache directory, set storagePath".into())
            })?;
            self.storage_path = base.join(APP_DIR);
        }
        if self.prefix.is_empty() {
            self.prefix = defaults.prefix;
        }
        if self.expire.is_zero() {
            self.expire = defaults.expire;
        }
        if self.dir_mode == 0 {
            self.dir_mode = defaults.dir_mode;
        }
        if self.file_mode == 0 {
            self.file_mode = defaults.file_mode;
        }
        if self.sweep_interval.is_zero() {
            self.sweep_interval = defaults.sweep_interval;
        }
        Ok(self)
    }
}
