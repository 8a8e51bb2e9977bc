//! Error types for asset operations.

use thiserror::Error;

/// Result type alias for asset operations.
pub type Result<T> = std::result::Result<T, AssetError>;

/// Errors that can occur inside storage backends, loaders and the API client.
///
/// The cache manager and the preloader never surface these to their callers:
/// cache mutations report a `bool`, and failed loads still count as loaded.
#[derive(Error, Debug)]
pub enum AssetError {
    /// Error when the underlying key-value storage fails
    #[error("Storage operation failed: {0}")]
    StorageError(String),

    /// Error when a write would exceed the storage quota
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Error when (de)serializing the persisted cache blob
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Error when a single image or video fails to load
    #[error("Failed to load {url}: {reason}")]
    LoadError {
        /// The asset that failed
        url: String,
        /// What went wrong
        reason: String,
    },

    /// Error when the REST API answers with a non-success status
    #[error("API request failed with status {status}: {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Message from the response body, if any
        message: String,
    },

    /// Transport-level HTTP failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Error when configuration cannot be loaded or is invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error for other failures
    #[error("Asset error: {0}")]
    Other(String),
}

impl AssetError {
    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        AssetError::StorageError(msg.into())
    }

    /// Create a new load error for the given asset
    pub fn load<U: Into<String>, S: Into<String>>(url: U, reason: S) -> Self {
        AssetError::LoadError {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        AssetError::ConfigError(msg.into())
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        AssetError::Other(msg.into())
    }

    /// HTTP status carried by this error, if it came from an API response
    pub fn status(&self) -> Option<u16> {
        match self {
            AssetError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<String> for AssetError {
    fn from(err: String) -> Self {
        AssetError::Other(err)
    }
}

impl From<&str> for AssetError {
    fn from(err: &str) -> Self {
        AssetError::Other(err.to_string())
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::StorageError(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        AssetError::SerializationError(err.to_string())
    }
}

impl From<figment::Error> for AssetError {
    fn from(err: figment::Error) -> Self {
        AssetError::ConfigError(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AssetError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AssetError::ApiError {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => AssetError::HttpError(err.to_string()),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for AssetError {
    fn from(err: redis::RedisError) -> Self {
        AssetError::StorageError(format!("Redis error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_for_api_errors() {
        let err = AssetError::ApiError {
            status: 404,
            message: "missing".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(AssetError::storage("disk full").status(), None);
    }

    #[test]
    fn test_serde_error_maps_to_serialization() {
        let err: AssetError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AssetError::SerializationError(_)));
    }
}
