//! Filesystem cache backend
//!
//! One file per key. The file's modification time is set to the entry's
//! deadline, so expiry is read straight from metadata without opening the
//! file. Writes go to a hidden temp file that is renamed into place, so a
//! reader never observes a partially written value.
//!
//! Expired files are removed by the read that finds them and by the
//! background sweep. Either removal checks the mtime and then unlinks the
//! path, and the filesystem offers no conditional unlink: a `set` renaming a
//! fresh file into place between those two steps loses its write, and the
//! next read misses.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs::{self, File, FileTimes};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::warn;

use stowage_core::{CacheBackend, CacheError, Result, effective_ttl, expiry_after};

use super::config::FileConfig;
use crate::sweeper::Sweeper;

const EXTENSION: &str = ".bin";
/// Hex length of a SHA-256 digest.
const HASH_LEN: usize = 64;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Shared state reachable from both the handle and the sweep task.
#[derive(Debug)]
struct FileStore {
    dir: PathBuf,
    prefix: String,
    expire: Duration,
    dir_mode: u32,
    file_mode: u32,
}

impl FileStore {
    fn file_name(&self, key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        format!("{}{}{}", self.prefix, hex::encode(digest), EXTENSION)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(self.file_name(key))
    }

    /// Whether `name` is a cache file written by a store with this prefix.
    ///
    /// Matches the exact layout rather than the prefix alone so `p1` never
    /// claims files belonging to `p10`.
    fn owns(&self, name: &str) -> bool {
        name.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_suffix(EXTENSION))
            .is_some_and(|hash| {
                hash.len() == HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
            })
    }

    /// `Ok(false)` when the file is missing or past its deadline.
    async fn is_live(&self, path: &Path) -> io::Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.modified()? > SystemTime::now()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Remove a file, treating "already gone" as success.
    async fn remove(path: &Path) -> io::Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Drop `path` if it has expired; returns whether the entry is live.
    ///
    /// An expired entry reads as absent even when removing it fails.
    async fn check(&self, path: &Path) -> io::Result<bool> {
        if self.is_live(path).await? {
            return Ok(true);
        }
        if let Err(err) = Self::remove(path).await {
            warn!(path = %path.display(), error = %err, "failed to remove expired cache file");
        }
        Ok(false)
    }

    async fn sweep(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(CacheError::backend("sweep", self.dir.display().to_string(), err));
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::backend("sweep", self.dir.display().to_string(), e))?
        {
            let name = entry.file_name();
            if !name.to_str().is_some_and(|name| self.owns(name)) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(CacheError::backend("sweep", name.to_string_lossy(), err)),
            };
            if modified <= now
                && Self::remove(&entry.path())
                    .await
                    .map_err(|e| CacheError::backend("sweep", name.to_string_lossy(), e))?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn write(&self, path: PathBuf, value: String, deadline: SystemTime) -> io::Result<()> {
        create_dir(&self.dir, self.dir_mode)?;

        let temp = self.dir.join(format!(
            ".{}-{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let result = write_file(&temp, value.as_bytes(), self.file_mode, deadline)
            .and_then(|()| fs::rename(&temp, &path));
        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result
    }
}

fn create_dir(dir: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(dir)
}

fn write_file(path: &Path, content: &[u8], mode: u32, deadline: SystemTime) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file: File = options.open(path)?;
    file.write_all(content)?;
    file.set_times(
        FileTimes::new()
            .set_accessed(SystemTime::now())
            .set_modified(deadline),
    )
}

/// Filesystem cache backend
///
/// Cloning shares the directory handle and the background sweeper, which
/// stops once the last clone is dropped.
#[derive(Clone)]
pub struct FileBackend {
    store: Arc<FileStore>,
    sweeper: Arc<Sweeper>,
}

impl FileBackend {
    /// Create a backend and start its background sweep.
    ///
    /// The storage directory is created on first write.
    pub fn new(config: FileConfig) -> Result<Self> {
        let config = config.normalized()?;
        let store = Arc::new(FileStore {
            dir: config.storage_path,
            prefix: config.prefix,
            expire: config.expire,
            dir_mode: config.dir_mode,
            file_mode: config.file_mode,
        });

        let swept = store.clone();
        let sweeper = Sweeper::spawn("file", config.sweep_interval, move || {
            let store = swept.clone();
            async move { store.sweep().await }
        });

        Ok(Self {
            store,
            sweeper: Arc::new(sweeper),
        })
    }

    /// Directory holding this backend's files
    pub fn storage_path(&self) -> &Path {
        &self.store.dir
    }

    /// Path of the file that stores `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.store.path_for(key)
    }

    /// Whether the background sweep is still running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Stop the background sweep; lazy expiry on read keeps working.
    pub fn shutdown(&self) {
        self.sweeper.shutdown();
    }

    /// Remove every expired file owned by this backend now.
    pub async fn sweep(&self) -> Result<usize> {
        self.store.sweep().await
    }
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("dir", &self.store.dir)
            .field("prefix", &self.store.prefix)
            .field("expire", &self.store.expire)
            .finish()
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<String> {
        let path = self.store.path_for(key);
        let live = self
            .store
            .check(&path)
            .await
            .map_err(|e| CacheError::backend("get", key, e))?;
        if !live {
            return Err(CacheError::NotFound(key.to_string()));
        }

        match tokio::fs::read(&path).await {
            Ok(content) => {
                String::from_utf8(content).map_err(|e| CacheError::backend("get", key, e))
            }
            // swept between the metadata check and the read
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(CacheError::NotFound(key.to_string()))
            }
            Err(err) => Err(CacheError::backend("get", key, err)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let store = self.store.clone();
        let path = store.path_for(key);
        let value = value.to_string();
        let deadline = expiry_after(effective_ttl(ttl, store.expire));

        tokio::task::spawn_blocking(move || store.write(path, value, deadline))
            .await
            .map_err(|e| CacheError::backend("set", key, e))?
            .map_err(|e| CacheError::backend("set", key, e))
    }

    async fn has(&self, key: &str) -> bool {
        match self.store.check(&self.store.path_for(key)).await {
            Ok(live) => live,
            Err(err) => {
                warn!(key, error = %err, "file cache lookup failed");
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        FileStore::remove(&self.store.path_for(key))
            .await
            .map(|_| ())
            .map_err(|e| CacheError::backend("delete", key, e))
    }

    async fn clear(&self) -> Result<()> {
        let dir = &self.store.dir;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(CacheError::backend("clear", dir.display().to_string(), err)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::backend("clear", dir.display().to_string(), e))?
        {
            let name = entry.file_name();
            if name.to_str().is_some_and(|name| self.store.owns(name)) {
                FileStore::remove(&entry.path())
                    .await
                    .map_err(|e| CacheError::backend("clear", name.to_string_lossy(), e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::loader;
    use tempfile::TempDir;

    fn backend(dir: &TempDir, prefix: &str) -> FileBackend {
        FileBackend::new(
            FileConfig::new(dir.path())
                .with_prefix(prefix)
                .with_expire(Duration::from_secs(2)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_basic_get_set() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");

        cache.set("key", "value", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), "value");
        assert!(cache.has("key").await);
    }

    #[tokio::test]
    async fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");
        cache.set("key", "raw value", Duration::ZERO).await.unwrap();

        let path = cache.path_for("key");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("cache"));
        assert!(name.ends_with(".bin"));
        assert_eq!(name.len(), "cache".len() + 64 + ".bin".len());
        assert_eq!(fs::read_to_string(&path).unwrap(), "raw value");

        // no temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_mtime_holds_deadline() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");
        cache.set("key", "value", Duration::from_secs(600)).await.unwrap();

        let modified = fs::metadata(cache.path_for("key")).unwrap().modified().unwrap();
        let ahead = modified.duration_since(SystemTime::now()).unwrap();
        assert!(ahead > Duration::from_secs(590));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");
        assert!(cache.get("missing").await.unwrap_err().is_not_found());
        assert!(!cache.has("missing").await);
    }

    #[tokio::test]
    async fn test_expiry() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");
        cache.set("a", "1", Duration::from_secs(1)).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), "1");

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cache.get("a").await.unwrap_err().is_not_found());
        assert!(!cache.path_for("a").exists());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_absent_when_removal_fails() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");

        // remove_file cannot unlink a directory
        let path = cache.path_for("k");
        fs::create_dir(&path).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get("k").await.unwrap_err().is_not_found());
        assert!(!cache.has("k").await);
        assert!(path.is_dir());

        // load gets past the read and runs the loader
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let result = cache
            .load(
                "k",
                loader(move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok("fresh".to_string())
                }),
                Duration::ZERO,
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        if let Err(err) = result {
            assert!(matches!(err, CacheError::Backend { operation: "set", .. }));
        }
    }

    #[tokio::test]
    async fn test_sweep_and_lazy_read_race_on_same_file() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");
        let path = cache.path_for("a");

        // the sweep wins: the read then finds nothing to remove
        cache.set("a", "1", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!cache.store.is_live(&path).await.unwrap());
        assert_eq!(cache.sweep().await.unwrap(), 1);
        assert!(!FileStore::remove(&path).await.unwrap());
        assert!(!cache.store.check(&path).await.unwrap());
        assert!(cache.get("a").await.unwrap_err().is_not_found());
        assert!(!cache.has("a").await);

        // the read wins: the sweep then finds nothing to remove
        cache.set("b", "2", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get("b").await.unwrap_err().is_not_found());
        assert_eq!(cache.sweep().await.unwrap(), 0);
        assert!(!cache.path_for("b").exists());
    }

    #[tokio::test]
    async fn test_zero_ttl_uses_default() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");
        cache.set("key", "value", Duration::ZERO).await.unwrap();

        let modified = fs::metadata(cache.path_for("key")).unwrap().modified().unwrap();
        let ahead = modified.duration_since(SystemTime::now()).unwrap();
        assert!(ahead > Duration::from_secs(1) && ahead <= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_overwrite() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");
        cache.set("key", "a much longer first value", Duration::ZERO).await.unwrap();
        cache.set("key", "short", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), "short");
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");
        cache.delete("missing").await.unwrap();

        cache.set("key", "value", Duration::ZERO).await.unwrap();
        cache.delete("key").await.unwrap();
        assert!(!cache.has("key").await);
    }

    #[tokio::test]
    async fn test_clear_is_scoped_by_prefix() {
        let dir = TempDir::new().unwrap();
        let p1 = backend(&dir, "p1");
        let p2 = backend(&dir, "p2");
        let p10 = backend(&dir, "p10");

        p1.set("x", "1", Duration::ZERO).await.unwrap();
        p2.set("x", "2", Duration::ZERO).await.unwrap();
        p10.set("x", "10", Duration::ZERO).await.unwrap();
        fs::write(dir.path().join("p1-notes.txt"), "keep").unwrap();

        p1.clear().await.unwrap();
        assert!(!p1.has("x").await);
        assert_eq!(p2.get("x").await.unwrap(), "2");
        assert_eq!(p10.get("x").await.unwrap(), "10");
        assert!(dir.path().join("p1-notes.txt").exists());
    }

    #[tokio::test]
    async fn test_clear_missing_directory() {
        let dir = TempDir::new().unwrap();
        let cache = FileBackend::new(FileConfig::new(dir.path().join("never-created"))).unwrap();
        cache.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let cache = FileBackend::new(FileConfig::new(&nested)).unwrap();

        cache.set("key", "value", Duration::ZERO).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(cache.get("key").await.unwrap(), "value");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mut config = FileConfig::new(dir.path().join("store"));
        config.dir_mode = 0o700;
        config.file_mode = 0o600;
        let cache = FileBackend::new(config).unwrap();
        cache.set("key", "value", Duration::ZERO).await.unwrap();

        let file_mode = fs::metadata(cache.path_for("key")).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        let dir_mode = fs::metadata(cache.storage_path()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_files() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");
        cache.set("old", "1", Duration::from_millis(20)).await.unwrap();
        cache.set("new", "2", Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.sweep().await.unwrap(), 1);
        assert!(!cache.path_for("old").exists());
        assert!(cache.path_for("new").exists());
    }

    #[tokio::test]
    async fn test_background_sweep() {
        let dir = TempDir::new().unwrap();
        let cache = FileBackend::new(
            FileConfig::new(dir.path()).with_sweep_interval(Duration::from_millis(20)),
        )
        .unwrap();
        assert!(cache.is_sweeping());

        cache.set("key", "value", Duration::from_millis(30)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!cache.path_for("key").exists());

        cache.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!cache.is_sweeping());
    }

    #[tokio::test]
    async fn test_load() {
        let dir = TempDir::new().unwrap();
        let cache = backend(&dir, "cache");

        let value = cache
            .load("key", loader(|| async { Ok("value".to_string()) }), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(value, "value");

        let value = cache
            .load("key", loader(|| async { Ok("value1".to_string()) }), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(value, "value");
    }
}
