#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # studio-assets
//!
//! Asset preloading for the studio portfolio site: hide image and video
//! latency behind a loading screen, and remember which videos have already
//! loaded so later visits can skip them.
//!
//! ## Features
//!
//! - `moka` (default): in-memory [`MemoryStorage`] backend
//! - `http` (default): [`HttpLoader`] and the [`ProjectsApi`] client, built on reqwest
//! - `redis`: shared [`RedisStorage`] backend
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "http")]
//! use studio_assets::{
//!     AppConfig, CacheOptions, FileStorage, HttpLoader, LoadingScreen, PreloadOptions,
//!     Preloader, VideoCache,
//! };
//! use std::sync::Arc;
//!
//! # #[cfg(feature = "http")]
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!
//!     let cache = Arc::new(VideoCache::new(
//!         FileStorage::new(&config.cache_dir),
//!         CacheOptions::new().max_cache_age(config.max_cache_age()),
//!     ));
//!     let preloader = Preloader::new(HttpLoader::from_config(&config)?).with_cache(cache.clone());
//!
//!     let images = vec!["https://cdn.example/cover.jpg".to_string()];
//!     let videos = vec!["https://cdn.example/reel.mp4".to_string()];
//!     cache.initialize(&videos).await;
//!
//!     let report = preloader
//!         .preload(&images, &videos, PreloadOptions::new().full_preload(config.full_preload))
//!         .await;
//!
//!     let mut screen = LoadingScreen::new();
//!     screen.apply(&report.state);
//!     println!("{}% {}", screen.percent(), screen.stage());
//!     Ok(())
//! }
//! # #[cfg(not(feature = "http"))]
//! # fn main() {}
//! ```

#[cfg(feature = "http")]
pub mod api;
pub mod carousel;
pub mod config;
pub mod error;
pub mod loader;
pub mod manager;
pub mod metadata;
pub mod options;
pub mod preloader;
pub mod progress;
pub mod storage;

#[cfg(feature = "http")]
pub use api::{error_message, ConnectionStatus, Project, ProjectsApi};
pub use carousel::{current_index, Breakpoint};
pub use config::AppConfig;
pub use error::{AssetError, Result};
#[cfg(feature = "http")]
pub use loader::HttpLoader;
pub use loader::AssetLoader;
pub use manager::VideoCache;
pub use metadata::{CacheEntry, CacheStore, CACHE_KEY, CACHE_VERSION, DEFAULT_CACHE_AGE};
pub use options::{CacheOptions, PreloadOptions, VideoPreload};
pub use preloader::{
    AssetKind, PreloadReport, PreloadSession, PreloadState, PreloadTask, Preloader, TaskStatus,
};
pub use progress::{LoadingScreen, LoadingStage};
#[cfg(feature = "moka")]
pub use storage::MemoryStorage;
#[cfg(feature = "redis")]
pub use storage::RedisStorage;
pub use storage::{FileStorage, Storage};
