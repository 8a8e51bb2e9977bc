//! Projects REST API client
//!
//! A thin, read-only client over the portfolio API. Its job inside this
//! crate is to turn project records into image and video URL lists for the
//! [`Preloader`](crate::Preloader); the API schema itself is taken as given.

use crate::config::AppConfig;
use crate::{AssetError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const API_V1_PATH: &str = "/v1";

/// One entry of a project's `video_urls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoUrl {
    /// Address of the video
    pub url: String,
}

/// A text block shown between project images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    /// Description id
    pub id: i64,
    /// Text content
    #[serde(default)]
    pub content: String,
    /// Ordering key on the project page
    #[serde(default)]
    pub position_display: i64,
}

/// A portfolio project as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project id
    pub id: i64,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: Option<String>,
    /// Gallery cover image
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Image shown on hover in the gallery
    #[serde(default)]
    pub hover_image: Option<String>,
    /// Detail page images, in display order
    #[serde(default)]
    pub images: Vec<String>,
    /// Detail page videos
    #[serde(default)]
    pub video_urls: Vec<VideoUrl>,
    /// Whether the detail page leads with its video
    #[serde(default)]
    pub show_video: Option<bool>,
    /// Text blocks for the detail page
    #[serde(default)]
    pub descriptions: Vec<Description>,
}

impl Project {
    /// Cover and hover images, for preloading the gallery grid
    pub fn gallery_images(&self) -> Vec<String> {
        self.cover_image
            .iter()
            .chain(self.hover_image.iter())
            .filter(|url| !url.is_empty())
            .cloned()
            .collect()
    }

    /// Detail page images, for preloading the carousel
    pub fn image_urls(&self) -> Vec<String> {
        self.images.clone()
    }

    /// Detail page video URLs
    pub fn video_urls(&self) -> Vec<String> {
        self.video_urls.iter().map(|v| v.url.clone()).collect()
    }

    /// Descriptions sorted by their display position
    pub fn sorted_descriptions(&self) -> Vec<&Description> {
        let mut descriptions: Vec<&Description> = self.descriptions.iter().collect();
        descriptions.sort_by_key(|d| d.position_display);
        descriptions
    }
}

/// Result of [`ProjectsApi::check_connection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Whether the API answered
    pub connected: bool,
    /// Status code of the answering endpoint, if any
    pub status: Option<u16>,
    /// Human-readable summary
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ApiErrorBody {
    fn first_message(self) -> Option<String> {
        if let Some(message) = self.message.filter(|m| !m.is_empty()) {
            return Some(message);
        }
        self.errors?
            .into_values()
            .next()
            .and_then(|messages| messages.into_iter().next())
    }
}

/// Read-only client for the projects API
#[derive(Debug, Clone)]
pub struct ProjectsApi {
    client: Client,
    config: AppConfig,
}

impl ProjectsApi {
    /// Build a client from application config
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AssetError::config(format!("failed to build HTTP client: {}", e)))?;

        if config.is_development() {
            tracing::info!(api_url = %config.api_url, "projects API client configured");
        }

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// All projects for the gallery
    pub async fn all_projects(&self) -> Result<Vec<Project>> {
        self.get_json(&format!("{}/projects", API_V1_PATH)).await
    }

    /// A single project
    pub async fn project(&self, id: impl fmt::Display) -> Result<Project> {
        self.get_json(&format!("{}/projects/{}", API_V1_PATH, id)).await
    }

    /// A single project with every image attached
    pub async fn project_full(&self, id: impl fmt::Display) -> Result<Project> {
        self.get_json(&format!("{}/projects/{}/full", API_V1_PATH, id))
            .await
    }

    /// A single project with its image list refreshed server-side
    pub async fn project_reloaded(&self, id: impl fmt::Display) -> Result<Project> {
        self.get_json(&format!("{}/projects/{}?reload_images=true", API_V1_PATH, id))
            .await
    }

    /// Probe `/health`, falling back to `/` when the health endpoint is missing.
    pub async fn check_connection(&self) -> ConnectionStatus {
        match self.client.get(self.config.url("/health")).send().await {
            Ok(response) if response.status().is_success() => ConnectionStatus {
                connected: true,
                status: Some(response.status().as_u16()),
                message: "Connected to API successfully".into(),
            },
            Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                match self.client.get(self.config.url("/")).send().await {
                    Ok(root) if root.status().is_success() => ConnectionStatus {
                        connected: true,
                        status: Some(root.status().as_u16()),
                        message: "Connected to API (root endpoint)".into(),
                    },
                    _ => ConnectionStatus {
                        connected: false,
                        status: None,
                        message: "API root endpoint not accessible".into(),
                    },
                }
            }
            Ok(response) => ConnectionStatus {
                connected: false,
                status: Some(response.status().as_u16()),
                message: "Failed to connect to API".into(),
            },
            Err(e) => {
                tracing::warn!(error = %e, "API connection check failed");
                ConnectionStatus {
                    connected: false,
                    status: e.status().map(|s| s.as_u16()),
                    message: "Failed to connect to API".into(),
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.config.url(path);
        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(%url, error = %e, "API request failed: no response received");
            AssetError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body: ApiErrorBody = response.json().await.unwrap_or_default();
            let message = body.first_message().unwrap_or_default();
            if status.is_server_error() {
                tracing::error!(%url, status = status.as_u16(), %message, "API server error");
            } else {
                tracing::warn!(%url, status = status.as_u16(), %message, "API request rejected");
            }
            return Err(AssetError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

/// User-facing message for a failed API call.
///
/// Prefers the message the API sent; otherwise describes the status code.
pub fn error_message(error: &AssetError) -> String {
    match error {
        AssetError::ApiError { message, .. } if !message.is_empty() => message.clone(),
        AssetError::ApiError { status, .. } => match status {
            401 => "You are not authorized to perform this action".into(),
            403 => "You do not have permission to access this resource".into(),
            404 => "The requested resource was not found".into(),
            422 => "Validation failed for the submitted data".into(),
            500 => "An internal server error occurred".into(),
            other => format!("Server error ({})", other),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT_JSON: &str = r#"{
        "id": 7,
        "name": "Wedding Reel",
        "cover_image": "https://cdn.example/7/cover.jpg",
        "hover_image": null,
        "images": ["https://cdn.example/7/1.jpg", "https://cdn.example/7/2.jpg"],
        "video_urls": [{"url": "https://cdn.example/7/reel.mp4"}],
        "descriptions": [
            {"id": 2, "content": "second", "position_display": 2},
            {"id": 1, "content": "first", "position_display": 1}
        ]
    }"#;

    fn config_for(server: &mockito::Server) -> AppConfig {
        AppConfig {
            api_url: format!("{}/api", server.url()),
            ..Default::default()
        }
    }

    #[test]
    fn test_project_url_extraction() {
        let project: Project = serde_json::from_str(PROJECT_JSON).unwrap();

        assert_eq!(project.gallery_images(), vec!["https://cdn.example/7/cover.jpg"]);
        assert_eq!(project.image_urls().len(), 2);
        assert_eq!(project.video_urls(), vec!["https://cdn.example/7/reel.mp4"]);
        let order: Vec<i64> = project.sorted_descriptions().iter().map(|d| d.id).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_project_missing_fields_default() {
        let project: Project = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert!(project.images.is_empty());
        assert!(project.video_urls().is_empty());
        assert!(project.gallery_images().is_empty());
    }

    #[test]
    fn test_error_messages() {
        let api = |status, message: &str| AssetError::ApiError {
            status,
            message: message.to_string(),
        };
        assert_eq!(error_message(&api(404, "")), "The requested resource was not found");
        assert_eq!(error_message(&api(401, "")), "You are not authorized to perform this action");
        assert_eq!(error_message(&api(503, "")), "Server error (503)");
        assert_eq!(error_message(&api(422, "Name is required")), "Name is required");
        assert_eq!(
            error_message(&AssetError::HttpError("timed out".into())),
            "HTTP error: timed out"
        );
    }

    #[tokio::test]
    async fn test_fetch_project() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/projects/7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PROJECT_JSON)
            .create_async()
            .await;

        let api = ProjectsApi::new(&config_for(&server)).unwrap();
        let project = api.project(7).await.unwrap();
        assert_eq!(project.name, "Wedding Reel");
    }

    #[tokio::test]
    async fn test_reloaded_project_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/projects/7")
            .match_query(mockito::Matcher::UrlEncoded(
                "reload_images".into(),
                "true".into(),
            ))
            .with_status(200)
            .with_body(PROJECT_JSON)
            .expect(1)
            .create_async()
            .await;

        let api = ProjectsApi::new(&config_for(&server)).unwrap();
        api.project_reloaded(7).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_carries_validation_message() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/projects")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"errors": {"name": ["Name is required"]}}"#)
            .create_async()
            .await;

        let api = ProjectsApi::new(&config_for(&server)).unwrap();
        let err = api.all_projects().await.unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(error_message(&err), "Name is required");
    }

    #[tokio::test]
    async fn test_check_connection_falls_back_to_root() {
        let mut server = mockito::Server::new_async().await;
        let _health = server
            .mock("GET", "/api/health")
            .with_status(404)
            .create_async()
            .await;
        let _root = server
            .mock("GET", "/api/")
            .with_status(200)
            .create_async()
            .await;

        let api = ProjectsApi::new(&config_for(&server)).unwrap();
        let status = api.check_connection().await;
        assert!(status.connected);
        assert_eq!(status.status, Some(200));
        assert_eq!(status.message, "Connected to API (root endpoint)");
    }

    #[tokio::test]
    async fn test_check_connection_unreachable() {
        let config = AppConfig {
            api_url: "http://127.0.0.1:1/api".into(),
            ..Default::default()
        };
        let api = ProjectsApi::new(&config).unwrap();
        let status = api.check_connection().await;
        assert!(!status.connected);
        assert_eq!(status.message, "Failed to connect to API");
    }
}
