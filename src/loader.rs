//! Asset loading backends
//!
//! An [`AssetLoader`] performs exactly one network load per call. The
//! preloader decides what to load and what to do with failures; loaders just
//! report them.

use crate::options::VideoPreload;
use crate::Result;
use async_trait::async_trait;

#[cfg(feature = "http")]
use crate::{config::AppConfig, AssetError};
#[cfg(feature = "http")]
use reqwest::{header, Client, StatusCode};

/// Performs a single image or video load.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Fetch an image until it is fully available
    async fn load_image(&self, url: &str) -> Result<()>;

    /// Fetch a video as far as `mode` requires
    async fn load_video(&self, url: &str, mode: VideoPreload) -> Result<()>;
}

#[async_trait]
impl<L: AssetLoader + ?Sized> AssetLoader for std::sync::Arc<L> {
    async fn load_image(&self, url: &str) -> Result<()> {
        (**self).load_image(url).await
    }

    async fn load_video(&self, url: &str, mode: VideoPreload) -> Result<()> {
        (**self).load_video(url, mode).await
    }
}

/// Default number of leading bytes fetched for a metadata-only video load
pub const DEFAULT_METADATA_BYTES: u64 = 64 * 1024;

/// HTTP loader built on reqwest
///
/// Images and full videos are downloaded and drained. Metadata loads ask for
/// a byte range and stop reading once enough bytes have arrived, even if the
/// server ignores the range.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: Client,
    metadata_bytes: u64,
}

#[cfg(feature = "http")]
impl HttpLoader {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            metadata_bytes: DEFAULT_METADATA_BYTES,
        }
    }

    /// Build a loader from application config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AssetError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::new(client).metadata_bytes(config.metadata_bytes))
    }

    /// Set how many leading bytes count as "metadata available"
    pub fn metadata_bytes(mut self, bytes: u64) -> Self {
        self.metadata_bytes = bytes.max(1);
        self
    }

    async fn fetch(&self, url: &str, limit: Option<u64>) -> Result<u64> {
        let mut request = self.client.get(url);
        if let Some(limit) = limit {
            request = request.header(header::RANGE, format!("bytes=0-{}", limit - 1));
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| AssetError::load(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::PARTIAL_CONTENT {
            return Err(AssetError::load(url, format!("unexpected status {}", status)));
        }

        let mut received: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AssetError::load(url, e.to_string()))?
        {
            received += chunk.len() as u64;
            if limit.is_some_and(|limit| received >= limit) {
                break;
            }
        }

        Ok(received)
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl AssetLoader for HttpLoader {
    async fn load_image(&self, url: &str) -> Result<()> {
        let bytes = self.fetch(url, None).await?;
        if bytes == 0 {
            return Err(AssetError::load(url, "empty image body"));
        }
        tracing::trace!(%url, bytes, "image loaded");
        Ok(())
    }

    async fn load_video(&self, url: &str, mode: VideoPreload) -> Result<()> {
        let limit = match mode {
            VideoPreload::Metadata => Some(self.metadata_bytes),
            VideoPreload::Full => None,
        };
        let bytes = self.fetch(url, limit).await?;
        if bytes == 0 {
            return Err(AssetError::load(url, "empty video body"));
        }
        tracing::trace!(%url, bytes, ?mode, "video loaded");
        Ok(())
    }
}
