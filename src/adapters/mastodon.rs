//! Mastodon client for posting announcements.
//!
//! Endpoints:
//! - POST {server}/api/v1/media (multipart: file, description)
//! - POST {server}/api/v1/statuses (JSON: status, media_ids)
//!
//! Auth: Bearer access token

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::Publisher;
use crate::core::artwork::Artwork;
use crate::core::Cancellation;
use crate::domain::{Announcement, MediaAttachment, PublishedReceipt};

/// Errors that can occur posting to Mastodon
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mastodon returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Publish cancelled")]
    Cancelled,
}

/// Credentials for the target account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    /// Instance base URL, e.g. https://mastodon.social
    pub server: String,
    /// OAuth application client ID
    pub client_id: String,
    /// OAuth application client secret
    pub client_secret: String,
    /// User access token
    pub access_token: String,
}

/// Error body returned by Mastodon
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

/// Prefer the `error` field of a JSON body, else the raw body
fn error_message(body: String) -> String {
    serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error)
        .unwrap_or(body)
}

/// Status payload for /api/v1/statuses
#[derive(Debug, Serialize)]
struct StatusPayload<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    media_ids: Vec<String>,
}

/// Mastodon API client
pub struct MastodonClient {
    config: MastodonConfig,
    client: reqwest::Client,
}

impl MastodonClient {
    /// Create a client from credentials and a shared HTTP client
    pub fn new(client: reqwest::Client, mut config: MastodonConfig) -> Self {
        config.server = config.server.trim_end_matches('/').to_string();
        Self { config, client }
    }

    /// Build API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.config.server, path)
    }

    /// Turn a non-2xx response into a `PublishError`
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PublishError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.text().await {
            Ok(body) => error_message(body),
            Err(e) => {
                debug!("Failed to read error body: {}", e);
                format!("<unreadable body: {}>", e)
            }
        };

        Err(PublishError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_media(
        &self,
        artwork: &Artwork,
        description: &str,
    ) -> Result<MediaAttachment, PublishError> {
        let file_part = Part::bytes(artwork.bytes.clone())
            .file_name(artwork.file_name())
            .mime_str(&artwork.content_type)?;

        let form = Form::new()
            .part("file", file_part)
            .text("description", description.to_string());

        let response = self
            .client
            .post(self.api_url("media"))
            .bearer_auth(&self.config.access_token)
            .multipart(form)
            .send()
            .await?;

        let media: MediaAttachment = Self::check(response).await?.json().await?;
        Ok(media)
    }

    async fn send_status(
        &self,
        announcement: &Announcement,
    ) -> Result<PublishedReceipt, PublishError> {
        let payload = StatusPayload {
            status: &announcement.text,
            media_ids: announcement.media_ids(),
        };

        let response = self
            .client
            .post(self.api_url("statuses"))
            .bearer_auth(&self.config.access_token)
            .header("Idempotency-Key", &announcement.idempotency_key)
            .json(&payload)
            .send()
            .await?;

        let receipt: PublishedReceipt = Self::check(response).await?.json().await?;
        Ok(receipt)
    }
}

#[async_trait]
impl Publisher for MastodonClient {
    fn name(&self) -> &str {
        "mastodon"
    }

    async fn upload_media(
        &self,
        artwork: &Artwork,
        description: &str,
        cancel: &Cancellation,
    ) -> Result<MediaAttachment, PublishError> {
        debug!(bytes = artwork.bytes.len(), "Uploading cover art");
        cancel
            .run(self.send_media(artwork, description))
            .await
            .ok_or(PublishError::Cancelled)?
    }

    async fn post_status(
        &self,
        announcement: &Announcement,
        cancel: &Cancellation,
    ) -> Result<PublishedReceipt, PublishError> {
        debug!(key = %announcement.idempotency_key, "Posting status");
        cancel
            .run(self.send_status(announcement))
            .await
            .ok_or(PublishError::Cancelled)?
    }
}
