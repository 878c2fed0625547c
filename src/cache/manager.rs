//! Cache manager for persisting inventory output to disk
//!
//! Provides a `CacheManager` that stores the serialized inventory in one file
//! and treats it as fresh while `mtime + expiration` lies in the future.

use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the inventory cache inside the cache directory
pub const CACHE_FILE_NAME: &str = "jeti-inventory.cache";

/// Upper bound on the expiration so timestamp arithmetic cannot overflow
const MAX_EXPIRATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug)]
pub struct CachedData {
    /// The cached inventory text
    pub data: String,
    /// When the file was last written
    pub cached_at: DateTime<Utc>,
    /// Whether the cache entry has expired
    pub is_expired: bool,
}

/// Manages reading and writing the inventory cache file
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where the cache file is stored
    cache_dir: PathBuf,
    /// How long a written cache stays fresh
    expiration: Duration,
}

impl CacheManager {
    /// Creates a CacheManager for `cache_dir` with an expiration in seconds
    pub fn with_dir(cache_dir: PathBuf, expiration_secs: u64) -> Self {
        Self {
            cache_dir,
            expiration: Duration::seconds(expiration_secs.min(MAX_EXPIRATION_SECS) as i64),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path of the cache file
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE_NAME)
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Modification time of a non-empty cache file
    fn modified(&self) -> Option<DateTime<Utc>> {
        let meta = fs::metadata(self.cache_path()).ok()?;
        if !meta.is_file() || meta.len() == 0 {
            return None;
        }
        meta.modified().ok().map(DateTime::<Utc>::from)
    }

    /// Determines whether the cache must be rebuilt
    ///
    /// The cache is stale when a refresh is forced, when the file is missing
    /// or empty, or when `mtime + expiration` is not after the current time.
    pub fn is_stale(&self, refresh: bool) -> bool {
        if refresh {
            return true;
        }
        match self.modified() {
            Some(mtime) => mtime + self.expiration <= Utc::now(),
            None => true,
        }
    }

    /// Writes inventory text to the cache file
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err` if directory creation or file writing fails
    pub fn write(&self, data: &str) -> io::Result<()> {
        self.ensure_dir()?;
        fs::write(self.cache_path(), data)
    }

    /// Reads the cache file
    ///
    /// Returns `None` if the file doesn't exist or is empty. Expired entries
    /// are still returned with `is_expired = true`.
    pub fn read(&self) -> Option<CachedData> {
        let cached_at = self.modified()?;
        let data = fs::read_to_string(self.cache_path()).ok()?;
        Some(CachedData {
            data,
            cached_at,
            is_expired: cached_at + self.expiration <= Utc::now(),
        })
    }

    /// Returns cached text while fresh, otherwise rebuilds and stores it
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: bool, produce: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: From<io::Error>,
    {
        if !self.is_stale(refresh) {
            if let Some(cached) = self.read() {
                tracing::debug!(path = %self.cache_path().display(), "using cached inventory");
                return Ok(cached.data);
            }
        }

        let data = produce().await?;
        self.write(&data)?;
        tracing::debug!(path = %self.cache_path().display(), "inventory cache written");
        Ok(data)
    }
}
