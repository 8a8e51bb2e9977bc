//! Concurrent asset preloading with aggregate progress
//!
//! A [`Preloader`] takes a list of image URLs and a list of video URLs,
//! loads them all concurrently and reports a 0-100 progress value once per
//! finished asset. Failures never block progress: a broken image or video is
//! logged and counted as loaded.
//!
//! Every call starts a new session. A background session started with
//! [`Preloader::spawn`] is superseded by the next `spawn` on the same
//! preloader, and can be abandoned explicitly. Clones track their own
//! sessions, so independent consumers never interfere, and an awaited
//! [`Preloader::preload`] is never superseded. In-flight loads of a
//! superseded or abandoned session are not cancelled, but their results no
//! longer reach the session's callbacks or state.

use crate::loader::AssetLoader;
use crate::manager::VideoCache;
use crate::options::{PreloadOptions, VideoPreload};
use crate::{AssetError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Kind of asset being preloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// A still image
    Image,
    /// A video
    Video,
}

/// Outcome of a single preload task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Still loading
    Pending,
    /// Loaded, skipped as empty, or served by the video cache
    Loaded,
    /// Failed to load; still counted toward progress
    Errored,
}

/// One asset within a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadTask {
    /// Image or video
    pub kind: AssetKind,
    /// Address of the asset; empty URLs complete immediately
    pub url: String,
    /// Current outcome
    pub status: TaskStatus,
}

impl PreloadTask {
    fn new(kind: AssetKind, url: &str) -> Self {
        Self {
            kind,
            url: url.to_string(),
            status: TaskStatus::Pending,
        }
    }
}

/// Observable state of a preload session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadState {
    /// False once every asset has completed
    pub is_loading: bool,
    /// `round(loaded_count / total_assets * 100)`, or 100 when there is nothing to load
    pub progress: u8,
    /// Number of completed assets, errors included
    pub loaded_count: usize,
    /// Number of assets in the session
    pub total_assets: usize,
}

impl PreloadState {
    fn starting(total_assets: usize) -> Self {
        if total_assets == 0 {
            return Self::finished(0);
        }
        Self {
            is_loading: true,
            progress: 0,
            loaded_count: 0,
            total_assets,
        }
    }

    fn finished(total_assets: usize) -> Self {
        Self {
            is_loading: false,
            progress: 100,
            loaded_count: total_assets,
            total_assets,
        }
    }

    /// Whether the session has reached 100%
    pub fn is_complete(&self) -> bool {
        !self.is_loading
    }
}

/// Final result of a session
#[derive(Debug, Clone)]
pub struct PreloadReport {
    /// State after the last completion
    pub state: PreloadState,
    /// Every task with its outcome, images first, in input order
    pub tasks: Vec<PreloadTask>,
}

impl PreloadReport {
    /// Number of tasks that failed to load
    pub fn errored(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Errored)
            .count()
    }
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

fn progress_for(loaded: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((loaded as f64 / total as f64) * 100.0).round() as u8
}

/// Per-session bookkeeping. Owned by the task driving the loads, so the
/// counter needs no synchronization.
struct Session {
    id: u64,
    // Id of the newest spawned session on the owning preloader
    latest: Option<Arc<AtomicU64>>,
    abandoned: Arc<AtomicBool>,
    options: PreloadOptions,
    state: watch::Sender<PreloadState>,
    loaded: usize,
    total: usize,
    completed: bool,
}

impl Session {
    fn is_active(&self) -> bool {
        !self.abandoned.load(Ordering::Acquire)
            && self
                .latest
                .as_ref()
                .is_none_or(|latest| latest.load(Ordering::Acquire) == self.id)
    }

    fn current(&self) -> PreloadState {
        PreloadState {
            is_loading: self.loaded < self.total,
            progress: progress_for(self.loaded, self.total),
            loaded_count: self.loaded,
            total_assets: self.total,
        }
    }

    /// Record one finished asset and notify the caller if still active.
    fn tick(&mut self) {
        self.loaded += 1;
        let state = self.current();
        self.publish(state);
    }

    fn publish(&mut self, state: PreloadState) {
        if !self.is_active() {
            tracing::debug!(session = self.id, "dropping update for inactive preload session");
            return;
        }

        self.state.send_replace(state);
        if let Some(ref on_progress) = self.options.on_progress {
            on_progress(state.progress);
        }

        if state.is_complete() && !self.completed {
            self.completed = true;
            tracing::info!(session = self.id, total = self.total, "preload complete");
            if let Some(ref on_complete) = self.options.on_complete {
                on_complete();
            }
        }
    }
}

/// Drives concurrent image and video loads.
///
/// # Examples
///
/// ```rust,no_run
/// # #[cfg(all(feature = "http", feature = "moka"))]
/// # async fn example() -> studio_assets::Result<()> {
/// use studio_assets::{
///     AppConfig, CacheOptions, HttpLoader, MemoryStorage, PreloadOptions, Preloader, VideoCache,
/// };
/// use std::sync::Arc;
///
/// let config = AppConfig::default();
/// let cache = Arc::new(VideoCache::new(MemoryStorage::new(), CacheOptions::default()));
/// let preloader = Preloader::new(HttpLoader::from_config(&config)?).with_cache(cache.clone());
///
/// let videos = vec!["https://cdn.example/reel.mp4".to_string()];
/// cache.initialize(&videos).await;
///
/// let report = preloader
///     .preload(
///         &["https://cdn.example/cover.jpg".to_string()],
///         &videos,
///         PreloadOptions::new().on_progress(|p| println!("{p}%")),
///     )
///     .await;
/// assert_eq!(report.state.progress, 100);
/// # Ok(())
/// # }
/// ```
pub struct Preloader {
    loader: Arc<dyn AssetLoader>,
    cache: Option<Arc<VideoCache>>,
    latest: Arc<AtomicU64>,
}

/// Clones share the loader and cache but not the session slot: a session
/// spawned on one clone never supersedes a session spawned on another.
impl Clone for Preloader {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            cache: self.cache.clone(),
            latest: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Preloader {
    /// Create a preloader that loads through `loader` without a video cache
    pub fn new<L>(loader: L) -> Self
    where
        L: AssetLoader + 'static,
    {
        Self {
            loader: Arc::new(loader),
            cache: None,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attach the shared video cache
    pub fn with_cache(mut self, cache: Arc<VideoCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The attached video cache, if any
    pub fn cache(&self) -> Option<&Arc<VideoCache>> {
        self.cache.as_ref()
    }

    /// Load every asset and resolve once all of them have completed.
    ///
    /// With no assets at all the session completes immediately at 100%
    /// without waiting on the cache. Otherwise, when caching is enabled, the
    /// call first waits for the cache to be initialized.
    ///
    /// The session lives exactly as long as the returned future: other calls
    /// on this preloader do not supersede it, and dropping the future stops it.
    pub async fn preload(
        &self,
        images: &[String],
        videos: &[String],
        options: PreloadOptions,
    ) -> PreloadReport {
        let (state, _) = watch::channel(PreloadState::starting(images.len() + videos.len()));
        let session = self.begin(images.len() + videos.len(), options, state, Arc::default(), false);
        self.run(images.to_vec(), videos.to_vec(), session).await
    }

    /// Start a session on a background task and return a handle to observe it.
    ///
    /// The new session supersedes any session previously spawned on this
    /// preloader. Dropping the handle abandons the session.
    pub fn spawn(
        &self,
        images: Vec<String>,
        videos: Vec<String>,
        options: PreloadOptions,
    ) -> PreloadSession {
        let total = images.len() + videos.len();
        let (state, receiver) = watch::channel(PreloadState::starting(total));
        let abandoned = Arc::new(AtomicBool::new(false));
        let session = self.begin(total, options, state, abandoned.clone(), true);

        let preloader = self.clone();
        let handle = tokio::spawn(async move { preloader.run(images, videos, session).await });

        PreloadSession {
            state: receiver,
            abandoned,
            handle: Some(handle),
        }
    }

    fn begin(
        &self,
        total: usize,
        options: PreloadOptions,
        state: watch::Sender<PreloadState>,
        abandoned: Arc<AtomicBool>,
        supersedable: bool,
    ) -> Session {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let latest = supersedable.then(|| {
            self.latest.store(id, Ordering::Release);
            self.latest.clone()
        });
        Session {
            id,
            latest,
            abandoned,
            options,
            state,
            loaded: 0,
            total,
            completed: false,
        }
    }

    async fn run(&self, images: Vec<String>, videos: Vec<String>, mut session: Session) -> PreloadReport {
        let mut tasks: Vec<PreloadTask> = images
            .iter()
            .map(|url| PreloadTask::new(AssetKind::Image, url))
            .chain(videos.iter().map(|url| PreloadTask::new(AssetKind::Video, url)))
            .collect();

        tracing::info!(
            session = session.id,
            images = images.len(),
            videos = videos.len(),
            "preload started"
        );

        if tasks.is_empty() {
            session.publish(PreloadState::finished(0));
            return PreloadReport {
                state: PreloadState::finished(0),
                tasks,
            };
        }

        let use_cache = session.options.use_cache;
        let mode = session.options.mode;
        let cache = self.cache.clone().filter(|_| use_cache);

        if let Some(ref cache) = cache {
            cache.wait_initialized().await;
        }

        let mut pending = FuturesUnordered::new();
        let mut immediate = Vec::new();

        for (index, task) in tasks.iter().enumerate() {
            if task.url.is_empty() {
                immediate.push(index);
                continue;
            }

            if task.kind == AssetKind::Video
                && cache.as_ref().is_some_and(|c| c.is_video_cached(&task.url))
            {
                tracing::debug!(url = %task.url, "video served from cache, skipping load");
                immediate.push(index);
                continue;
            }

            let loader = self.loader.clone();
            let cache = cache.clone();
            let kind = task.kind;
            let url = task.url.clone();
            pending.push(async move {
                let result = load_one(loader.as_ref(), cache.as_deref(), kind, &url, mode).await;
                (index, result)
            });
        }

        for index in immediate {
            tasks[index].status = TaskStatus::Loaded;
            session.tick();
        }

        while let Some((index, result)) = pending.next().await {
            let task = &mut tasks[index];
            match result {
                Ok(()) => task.status = TaskStatus::Loaded,
                Err(e) => {
                    tracing::warn!(url = %task.url, kind = ?task.kind, error = %e, "asset failed to load, counting it as loaded");
                    task.status = TaskStatus::Errored;
                }
            }
            session.tick();
        }

        PreloadReport {
            state: session.current(),
            tasks,
        }
    }
}

async fn load_one(
    loader: &dyn AssetLoader,
    cache: Option<&VideoCache>,
    kind: AssetKind,
    url: &str,
    mode: VideoPreload,
) -> Result<()> {
    match kind {
        AssetKind::Image => loader.load_image(url).await,
        AssetKind::Video => {
            loader.load_video(url, mode).await?;
            if let Some(cache) = cache {
                cache.add_to_cache(url).await;
            }
            Ok(())
        }
    }
}

/// Handle to a preload session running on a background task
pub struct PreloadSession {
    state: watch::Receiver<PreloadState>,
    abandoned: Arc<AtomicBool>,
    handle: Option<JoinHandle<PreloadReport>>,
}

impl PreloadSession {
    /// Latest published state
    pub fn state(&self) -> PreloadState {
        *self.state.borrow()
    }

    /// A receiver that is notified on every published update
    pub fn subscribe(&self) -> watch::Receiver<PreloadState> {
        self.state.clone()
    }

    /// Stop delivering callbacks and state updates for this session.
    /// Loads already in flight run to completion and are ignored.
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::Release);
    }

    /// Whether [`abandon`](Self::abandon) has been called
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    /// Wait for every load of the session to finish
    pub async fn wait(mut self) -> Result<PreloadReport> {
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| AssetError::other(format!("preload task failed: {}", e))),
            None => Err(AssetError::other("preload session already awaited")),
        }
    }
}

impl Drop for PreloadSession {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct InstantLoader;

    #[async_trait]
    impl AssetLoader for InstantLoader {
        async fn load_image(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn load_video(&self, url: &str, _mode: VideoPreload) -> Result<()> {
            Err(AssetError::load(url, "codec not supported"))
        }
    }

    #[test]
    fn test_progress_rounding() {
        assert_eq!(progress_for(0, 3), 0);
        assert_eq!(progress_for(1, 3), 33);
        assert_eq!(progress_for(2, 3), 67);
        assert_eq!(progress_for(3, 3), 100);
        assert_eq!(progress_for(1, 8), 13);
        assert_eq!(progress_for(0, 0), 100);
    }

    #[test]
    fn test_starting_state() {
        assert_eq!(PreloadState::starting(0), PreloadState::finished(0));
        let state = PreloadState::starting(4);
        assert!(state.is_loading);
        assert_eq!(state.progress, 0);
        assert_eq!(state.total_assets, 4);
    }

    #[tokio::test]
    async fn test_errors_and_empty_urls_count_as_loaded() {
        let preloader = Preloader::new(InstantLoader);
        let report = preloader
            .preload(
                &["a.jpg".to_string(), String::new()],
                &["broken.mp4".to_string()],
                PreloadOptions::new(),
            )
            .await;

        assert_eq!(report.state, PreloadState::finished(3));
        assert_eq!(report.errored(), 1);
        assert_eq!(report.tasks[1].status, TaskStatus::Loaded);
        assert_eq!(report.tasks[2].kind, AssetKind::Video);
        assert_eq!(report.tasks[2].status, TaskStatus::Errored);
    }

    #[tokio::test]
    async fn test_abandoned_session_stops_publishing() {
        let preloader = Preloader::new(InstantLoader);
        let (state, receiver) = watch::channel(PreloadState::starting(1));
        let abandoned = Arc::new(AtomicBool::new(true));
        let session = preloader.begin(1, PreloadOptions::new(), state, abandoned, false);

        let report = preloader
            .run(vec!["a.jpg".to_string()], Vec::new(), session)
            .await;

        // The loads still ran, but nothing was published
        assert_eq!(report.state.progress, 100);
        assert_eq!(receiver.borrow().progress, 0);
    }
}
