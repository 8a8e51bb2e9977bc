//! Durable key-value storage for the persisted video cache
//!
//! This module provides the storage abstraction the cache manager writes its
//! blob through, plus concrete backends: Moka (in-memory), a directory of
//! JSON files (durable across runs) and Redis (shared).

use crate::{AssetError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[cfg(feature = "moka")]
use moka::future::Cache as MokaFutureCache;
#[cfg(feature = "moka")]
use std::sync::Arc;

#[cfg(feature = "redis")]
use redis::{aio::MultiplexedConnection, AsyncCommands};

/// Storage trait for string blobs addressed by key.
///
/// Backends report failures as errors; the cache manager is the layer that
/// swallows them.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the blob stored under `key`
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if nothing is stored under the key.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous blob
    async fn set_item(&self, key: &str, value: String) -> Result<()>;

    /// Remove the blob under `key`. Removing a missing key succeeds.
    async fn remove_item(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        (**self).set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        (**self).remove_item(key).await
    }
}

/// Moka-based in-memory storage
///
/// Nothing survives the process, which makes it the backend of choice for
/// tests and for sessions where persistence is disabled. An optional quota
/// mimics the size limit browsers put on their storage.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "moka")]
/// use studio_assets::MemoryStorage;
///
/// # #[cfg(feature = "moka")]
/// let storage = MemoryStorage::new().with_quota(5 * 1024 * 1024);
/// ```
#[cfg(feature = "moka")]
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<MokaFutureCache<String, String>>,
    quota: Option<usize>,
}

#[cfg(feature = "moka")]
impl MemoryStorage {
    /// Create an empty, unbounded storage
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MokaFutureCache::builder().build()),
            quota: None,
        }
    }

    /// Reject writes that would push the stored bytes (keys plus values)
    /// above `max_bytes`
    pub fn with_quota(mut self, max_bytes: usize) -> Self {
        self.quota = Some(max_bytes);
        self
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.inner
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

#[cfg(feature = "moka")]
impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "moka")]
#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.get(key).await)
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        if let Some(quota) = self.quota {
            let needed = self.used_bytes_excluding(key) + key.len() + value.len();
            if needed > quota {
                return Err(AssetError::QuotaExceeded(format!(
                    "writing {} needs {} bytes, quota is {}",
                    key, needed, quota
                )));
            }
        }
        self.inner.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}

/// File-backed storage
///
/// Each key maps to `<dir>/<key>.json`. Writes go to a temporary file first
/// and are renamed into place, so readers never observe a half-written blob.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create a storage rooted at `dir`. The directory is created lazily on
    /// the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory blobs are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(AssetError::storage(format!("invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Redis-based storage
///
/// Lets several site instances share one cache. Requires the "redis"
/// feature to be enabled.
///
/// # Examples
///
/// ```rust,no_run
/// # #[cfg(feature = "redis")]
/// use studio_assets::RedisStorage;
///
/// # #[cfg(feature = "redis")]
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = RedisStorage::new("redis://localhost:6379").await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisStorage {
    connection: MultiplexedConnection,
    prefix: String,
}

#[cfg(feature = "redis")]
impl RedisStorage {
    /// Connect to the Redis server at `redis_url`
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::with_prefix(redis_url, "studio:".to_string()).await
    }

    /// Connect with a custom key prefix
    pub async fn with_prefix(redis_url: &str, prefix: String) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;

        Ok(Self { connection, prefix })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[cfg(feature = "redis")]
#[async_trait]
impl Storage for RedisStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        Ok(conn.get::<String, Option<String>>(self.full_key(key)).await?)
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.set::<String, String, ()>(self.full_key(key), value).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.del::<String, ()>(self.full_key(key)).await?;
        Ok(())
    }
}
