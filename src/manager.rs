//! Persisted video cache manager
//!
//! [`VideoCache`] answers "has this video already loaded successfully?" and
//! remembers the answer across sessions. Everything it knows lives in one
//! JSON blob under [`CACHE_KEY`]; mutations read the whole blob, change one
//! key and write the whole blob back (last writer wins).
//!
//! The cache is an optimization only. No public operation returns an error:
//! queries fall back to "miss" and mutations report `false`.

use crate::metadata::{current_time_millis, parse_store, CacheEntry, CacheStore, CACHE_KEY};
use crate::options::CacheOptions;
use crate::storage::Storage;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{watch, Mutex};

/// Manager for the persisted video cache.
///
/// Construct one per application root and share it by `Arc` with every
/// [`Preloader`](crate::Preloader) that should skip known-good videos.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "moka")]
/// use studio_assets::{CacheOptions, MemoryStorage, VideoCache};
///
/// # #[cfg(feature = "moka")]
/// # async fn example() {
/// let cache = VideoCache::new(MemoryStorage::new(), CacheOptions::default());
/// cache.initialize(&["https://cdn.example/reel.mp4".to_string()]).await;
///
/// assert!(!cache.is_video_cached("https://cdn.example/reel.mp4"));
/// assert!(cache.add_to_cache("https://cdn.example/reel.mp4").await);
/// assert!(cache.is_video_cached("https://cdn.example/reel.mp4"));
/// # }
/// ```
pub struct VideoCache {
    storage: Arc<dyn Storage>,
    options: CacheOptions,
    valid: RwLock<HashSet<String>>,
    initialized: watch::Sender<bool>,
    // Serializes read-modify-write cycles issued from this process.
    write_lock: Mutex<()>,
}

impl VideoCache {
    /// Create a manager over `storage`. Queries report misses until
    /// [`initialize`](Self::initialize) has run.
    pub fn new<S>(storage: S, options: CacheOptions) -> Self
    where
        S: Storage + 'static,
    {
        let (initialized, _) = watch::channel(false);
        Self {
            storage: Arc::new(storage),
            options,
            valid: RwLock::new(HashSet::new()),
            initialized,
            write_lock: Mutex::new(()),
        }
    }

    /// Options this manager was built with
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Load the persisted store and build the set of currently valid URLs.
    ///
    /// `urls` are the videos the caller is about to use: each one gets an
    /// `on_cache_hit` or `on_cache_miss` callback. A missing or unreadable
    /// store counts as empty. Storage is never written.
    pub async fn initialize(&self, urls: &[String]) {
        // Held until the valid set is swapped so no concurrent add is lost.
        let _guard = self.write_lock.lock().await;
        let now = current_time_millis();
        let max_age = self.options.max_cache_age;

        let store = match self.storage.get_item(CACHE_KEY).await {
            Ok(Some(blob)) => match parse_store(&blob) {
                Ok(store) => store,
                Err(e) => {
                    tracing::warn!(error = %e, "persisted video cache is unreadable, ignoring it");
                    CacheStore::new()
                }
            },
            Ok(None) => CacheStore::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted video cache");
                CacheStore::new()
            }
        };

        let valid: HashSet<String> = store
            .valid_urls(now, max_age)
            .map(str::to_string)
            .collect();

        for url in urls {
            if valid.contains(url) {
                tracing::debug!(%url, "video cache hit");
                if let Some(ref on_hit) = self.options.on_cache_hit {
                    on_hit(url);
                }
            } else {
                tracing::debug!(%url, "video cache miss");
                if let Some(ref on_miss) = self.options.on_cache_miss {
                    on_miss(url);
                }
            }
        }

        tracing::debug!(
            stored = store.len(),
            valid = valid.len(),
            "video cache initialized"
        );

        *self.valid.write().unwrap_or_else(PoisonError::into_inner) = valid;
        self.initialized.send_replace(true);
    }

    /// Whether [`initialize`](Self::initialize) has completed
    pub fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }

    /// Suspend until [`initialize`](Self::initialize) has completed.
    pub async fn wait_initialized(&self) {
        let mut rx = self.initialized.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Check whether `url` is known to have loaded within the TTL.
    pub fn is_video_cached(&self, url: &str) -> bool {
        self.valid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    /// Snapshot of every URL currently considered valid
    pub fn cached_videos(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .valid
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        urls.sort();
        urls
    }

    /// Record that `url` loaded successfully.
    ///
    /// Returns `false` if the store could not be written (quota exceeded,
    /// storage unavailable); the caller should simply carry on uncached.
    pub async fn add_to_cache(&self, url: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let mut store = match self.read_store().await {
            Ok(store) => store.unwrap_or_default(),
            // An unreadable blob is replaced rather than blocking all future writes.
            Err(crate::AssetError::SerializationError(_)) => CacheStore::new(),
            Err(e) => {
                tracing::warn!(%url, error = %e, "failed to read video cache before insert");
                return false;
            }
        };

        store.insert(url.to_string(), CacheEntry::new());

        if let Err(e) = self.write_store(&store).await {
            tracing::warn!(%url, error = %e, "failed to persist video cache entry");
            return false;
        }

        self.valid
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string());
        tracing::debug!(%url, "video cached");
        true
    }

    /// Forget `url`.
    ///
    /// Returns `false` if it was not stored, or if the store could not be
    /// read or written.
    pub async fn remove_from_cache(&self, url: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let mut store = match self.read_store().await {
            Ok(Some(store)) => store,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(%url, error = %e, "failed to read video cache before removal");
                return false;
            }
        };

        if !store.remove(url) {
            return false;
        }

        if let Err(e) = self.write_store(&store).await {
            tracing::warn!(%url, error = %e, "failed to persist video cache removal");
            return false;
        }

        self.valid
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url);
        tracing::debug!(%url, "video removed from cache");
        true
    }

    /// Delete the persisted store entirely. Safe to call repeatedly.
    pub async fn clear_cache(&self) -> bool {
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.storage.remove_item(CACHE_KEY).await {
            tracing::warn!(error = %e, "failed to clear video cache");
            return false;
        }

        self.valid
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::debug!("video cache cleared");
        true
    }

    async fn read_store(&self) -> crate::Result<Option<CacheStore>> {
        match self.storage.get_item(CACHE_KEY).await? {
            Some(blob) => Ok(Some(parse_store(&blob)?)),
            None => Ok(None),
        }
    }

    async fn write_store(&self, store: &CacheStore) -> crate::Result<()> {
        let blob = serde_json::to_string(store)?;
        self.storage.set_item(CACHE_KEY, blob).await
    }
}

#[cfg(all(test, feature = "moka"))]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::AssetError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct UnavailableStorage;

    #[async_trait]
    impl Storage for UnavailableStorage {
        async fn get_item(&self, _key: &str) -> crate::Result<Option<String>> {
            Err(AssetError::storage("storage disabled"))
        }

        async fn set_item(&self, _key: &str, _value: String) -> crate::Result<()> {
            Err(AssetError::storage("storage disabled"))
        }

        async fn remove_item(&self, _key: &str) -> crate::Result<()> {
            Err(AssetError::storage("storage disabled"))
        }
    }

    async fn seed(storage: &MemoryStorage, store: &CacheStore) {
        storage
            .set_item(CACHE_KEY, serde_json::to_string(store).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_initialize_sets_flag_and_wakes_waiters() {
        let cache = Arc::new(VideoCache::new(MemoryStorage::new(), CacheOptions::default()));
        assert!(!cache.is_initialized());

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.wait_initialized().await })
        };

        cache.initialize(&[]).await;
        assert!(cache.is_initialized());
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_hit_and_miss_callbacks() {
        let storage = MemoryStorage::new();
        let now = current_time_millis();
        let mut store = CacheStore::new();
        store.insert("fresh.mp4".into(), CacheEntry::with_time(now));
        store.insert(
            "stale.mp4".into(),
            CacheEntry::with_time(now - Duration::from_secs(8 * 24 * 3600).as_millis() as u64),
        );
        store.insert(
            "old-schema.mp4".into(),
            CacheEntry {
                timestamp: now,
                version: "v0".into(),
            },
        );
        seed(&storage, &store).await;

        let hits = Arc::new(std::sync::Mutex::new(Vec::new()));
        let misses = Arc::new(std::sync::Mutex::new(Vec::new()));
        let hits_clone = hits.clone();
        let misses_clone = misses.clone();

        let cache = VideoCache::new(
            storage,
            CacheOptions::new()
                .on_cache_hit(move |url| hits_clone.lock().unwrap().push(url.to_string()))
                .on_cache_miss(move |url| misses_clone.lock().unwrap().push(url.to_string())),
        );

        let queried: Vec<String> = ["fresh.mp4", "stale.mp4", "old-schema.mp4", "unknown.mp4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        cache.initialize(&queried).await;

        assert_eq!(*hits.lock().unwrap(), vec!["fresh.mp4".to_string()]);
        assert_eq!(
            *misses.lock().unwrap(),
            vec![
                "stale.mp4".to_string(),
                "old-schema.mp4".to_string(),
                "unknown.mp4".to_string()
            ]
        );
        assert!(cache.is_video_cached("fresh.mp4"));
        assert!(!cache.is_video_cached("stale.mp4"));
        assert!(!cache.is_video_cached("old-schema.mp4"));
        assert_eq!(cache.cached_videos(), vec!["fresh.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_custom_max_age() {
        let storage = MemoryStorage::new();
        let mut store = CacheStore::new();
        store.insert(
            "a.mp4".into(),
            CacheEntry::with_time(current_time_millis() - 10_000),
        );
        seed(&storage, &store).await;

        let cache = VideoCache::new(
            storage,
            CacheOptions::new().max_cache_age(Duration::from_secs(5)),
        );
        cache.initialize(&[]).await;
        assert!(!cache.is_video_cached("a.mp4"));
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_empty_and_overwritten() {
        let storage = MemoryStorage::new();
        storage
            .set_item(CACHE_KEY, "not json".to_string())
            .await
            .unwrap();

        let cache = VideoCache::new(storage.clone(), CacheOptions::default());
        cache.initialize(&["a.mp4".to_string()]).await;
        assert!(cache.is_initialized());
        assert!(!cache.is_video_cached("a.mp4"));

        assert!(cache.add_to_cache("a.mp4").await);
        let blob = storage.get_item(CACHE_KEY).await.unwrap().unwrap();
        assert!(parse_store(&blob).unwrap().contains_key("a.mp4"));
    }

    #[tokio::test]
    async fn test_foreign_entry_keeps_valid_neighbours() {
        let storage = MemoryStorage::new();
        let now = current_time_millis();
        let blob = format!(
            r#"{{"good.mp4":{{"timestamp":{now},"version":"v1"}},"legacy.mp4":{{"timestamp":"2024-01-01","version":"v0"}}}}"#
        );
        storage.set_item(CACHE_KEY, blob).await.unwrap();

        let cache = VideoCache::new(storage.clone(), CacheOptions::default());
        cache
            .initialize(&["good.mp4".to_string(), "legacy.mp4".to_string()])
            .await;
        assert!(cache.is_video_cached("good.mp4"));
        assert!(!cache.is_video_cached("legacy.mp4"));

        assert!(cache.add_to_cache("new.mp4").await);
        let persisted = parse_store(&storage.get_item(CACHE_KEY).await.unwrap().unwrap()).unwrap();
        assert!(persisted.entry("good.mp4").is_some());
        assert!(persisted.entry("new.mp4").is_some());
        // Left exactly as found
        assert!(persisted.contains_key("legacy.mp4"));
        assert!(persisted.entry("legacy.mp4").is_none());

        // A foreign record can still be removed
        assert!(cache.remove_from_cache("legacy.mp4").await);
        let persisted = parse_store(&storage.get_item(CACHE_KEY).await.unwrap().unwrap()).unwrap();
        assert!(!persisted.contains_key("legacy.mp4"));
        assert!(persisted.contains_key("good.mp4"));
    }

    #[tokio::test]
    async fn test_initialize_does_not_drop_concurrent_add() {
        let cache = Arc::new(VideoCache::new(MemoryStorage::new(), CacheOptions::default()));
        let adds: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.add_to_cache(&format!("v{i}.mp4")).await })
            })
            .collect();
        let init = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.initialize(&[]).await })
        };

        for add in adds {
            assert!(add.await.unwrap());
        }
        init.await.unwrap();

        assert_eq!(cache.cached_videos().len(), 8);
    }

    #[tokio::test]
    async fn test_add_preserves_other_entries() {
        let storage = MemoryStorage::new();
        let mut store = CacheStore::new();
        store.insert("other.mp4".into(), CacheEntry::with_time(42));
        seed(&storage, &store).await;

        let cache = VideoCache::new(storage.clone(), CacheOptions::default());
        cache.initialize(&[]).await;
        assert!(cache.add_to_cache("new.mp4").await);

        let persisted = parse_store(&storage.get_item(CACHE_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted.entry("other.mp4").unwrap().timestamp, 42);
        assert_eq!(
            persisted.entry("new.mp4").unwrap().version,
            crate::metadata::CACHE_VERSION
        );
    }

    #[tokio::test]
    async fn test_remove_from_cache() {
        let cache = VideoCache::new(MemoryStorage::new(), CacheOptions::default());
        cache.initialize(&[]).await;

        // Nothing stored yet
        assert!(!cache.remove_from_cache("a.mp4").await);

        assert!(cache.add_to_cache("a.mp4").await);
        assert!(cache.remove_from_cache("a.mp4").await);
        assert!(!cache.is_video_cached("a.mp4"));

        // Already gone
        assert!(!cache.remove_from_cache("a.mp4").await);
    }

    #[tokio::test]
    async fn test_quota_exceeded_returns_false() {
        let cache = VideoCache::new(MemoryStorage::new().with_quota(16), CacheOptions::default());
        cache.initialize(&[]).await;

        assert!(!cache.add_to_cache("https://cdn.example/very/long/video.mp4").await);
        assert!(!cache.is_video_cached("https://cdn.example/very/long/video.mp4"));
    }

    #[tokio::test]
    async fn test_unavailable_storage_never_panics() {
        let cache = VideoCache::new(UnavailableStorage, CacheOptions::default());
        cache.initialize(&["a.mp4".to_string()]).await;

        assert!(cache.is_initialized());
        assert!(!cache.is_video_cached("a.mp4"));
        assert!(!cache.add_to_cache("a.mp4").await);
        assert!(!cache.remove_from_cache("a.mp4").await);
        assert!(!cache.clear_cache().await);
    }
}
