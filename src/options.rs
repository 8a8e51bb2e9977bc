//! Configuration options for the video cache and the preloader
//!
//! Both option sets are built with chained setters, the same way from the
//! cache manager's constructor to a single `preload` call.

use crate::metadata::DEFAULT_CACHE_AGE;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback receiving a video URL
pub type UrlCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback receiving a progress percentage (0-100)
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Callback fired once a preload session has finished
pub type CompleteCallback = Arc<dyn Fn() + Send + Sync>;

/// Options controlling how the [`VideoCache`](crate::VideoCache) validates
/// entries and reports lookups.
#[derive(Clone)]
pub struct CacheOptions {
    /// Maximum age of a valid entry
    pub max_cache_age: Duration,

    /// Called during initialization for each queried URL that is cached
    pub on_cache_hit: Option<UrlCallback>,

    /// Called during initialization for each queried URL that is not cached
    pub on_cache_miss: Option<UrlCallback>,
}

impl CacheOptions {
    /// Options with the default 7 day TTL and no callbacks
    pub fn new() -> Self {
        Self {
            max_cache_age: DEFAULT_CACHE_AGE,
            on_cache_hit: None,
            on_cache_miss: None,
        }
    }

    /// Set the maximum age of a valid entry
    pub fn max_cache_age(mut self, max_age: Duration) -> Self {
        self.max_cache_age = max_age;
        self
    }

    /// Set the cache hit callback
    pub fn on_cache_hit<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_cache_hit = Some(Arc::new(callback));
        self
    }

    /// Set the cache miss callback
    pub fn on_cache_miss<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_cache_miss = Some(Arc::new(callback));
        self
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("max_cache_age", &self.max_cache_age)
            .field("on_cache_hit", &self.on_cache_hit.is_some())
            .field("on_cache_miss", &self.on_cache_miss.is_some())
            .finish()
    }
}

/// How much of a video has to arrive before it counts as loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoPreload {
    /// Only the leading bytes carrying the container metadata
    #[default]
    Metadata,
    /// The whole file, so playback can run through without buffering
    Full,
}

/// Options for a single preload session
#[derive(Clone)]
pub struct PreloadOptions {
    /// Whether to consult and update the video cache
    pub use_cache: bool,

    /// How far each uncached video is loaded
    pub mode: VideoPreload,

    /// Called with the new percentage after every completed asset
    pub on_progress: Option<ProgressCallback>,

    /// Called once every asset has completed
    pub on_complete: Option<CompleteCallback>,
}

impl PreloadOptions {
    /// Options with caching on, metadata-only video loads and no callbacks
    pub fn new() -> Self {
        Self {
            use_cache: true,
            mode: VideoPreload::Metadata,
            on_progress: None,
            on_complete: None,
        }
    }

    /// Set whether the video cache is consulted
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Set how far videos are loaded
    pub fn mode(mut self, mode: VideoPreload) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(VideoPreload::Full)` when `full` is true
    pub fn full_preload(self, full: bool) -> Self {
        self.mode(if full {
            VideoPreload::Full
        } else {
            VideoPreload::Metadata
        })
    }

    /// Set the progress callback
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Set the completion callback
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PreloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadOptions")
            .field("use_cache", &self.use_cache)
            .field("mode", &self.mode)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preload_options_builder() {
        let options = PreloadOptions::new()
            .use_cache(false)
            .full_preload(true)
            .on_progress(|_| {})
            .on_complete(|| {});

        assert!(!options.use_cache);
        assert_eq!(options.mode, VideoPreload::Full);
        assert!(options.on_progress.is_some());
        assert!(options.on_complete.is_some());
    }

    #[test]
    fn test_preload_options_minimal() {
        let options = PreloadOptions::default();

        assert!(options.use_cache);
        assert_eq!(options.mode, VideoPreload::Metadata);
        assert!(options.on_progress.is_none());
        assert!(options.on_complete.is_none());
    }

    #[test]
    fn test_cache_options_builder() {
        let options = CacheOptions::new()
            .max_cache_age(Duration::from_secs(60))
            .on_cache_miss(|_| {});

        assert_eq!(options.max_cache_age, Duration::from_secs(60));
        assert!(options.on_cache_hit.is_none());
        assert!(options.on_cache_miss.is_some());
        assert_eq!(CacheOptions::default().max_cache_age, DEFAULT_CACHE_AGE);
    }
}
