//! Cover art selection and download.
//!
//! Artwork is best effort: every failure here degrades the post to
//! text-only and never blocks publishing.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::debug;

use super::cancel::Cancellation;
use crate::adapters::{ImageFetcher, PublishError};
use crate::domain::{TrackRecord, UNKNOWN_ALBUM};

/// Identifier of Last.fm's generic "no album art" image
pub const PLACEHOLDER_SIGNATURE: &str = "2a96cbd8b46e442fc41c2b86b821562f";

/// Content type assumed when the server does not send one
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Errors that can occur resolving artwork
#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("Track has no usable image")]
    NoImage,

    #[error("URL is the generic placeholder art; not fetching: {url}")]
    Placeholder { url: String },

    #[error("Image URL returned status {status}")]
    Status { status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload failed: {0}")]
    Upload(#[from] PublishError),

    #[error("Artwork fetch cancelled")]
    Cancelled,
}

/// Fixed size ranking for Last.fm image labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageSize {
    Unknown = 0,
    Small = 1,
    Medium = 2,
    Large = 3,
    ExtraLarge = 4,
    Mega = 5,
}

impl ImageSize {
    /// Map a size label to its rank; unknown labels rank lowest
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "small" => ImageSize::Small,
            "medium" => ImageSize::Medium,
            "large" => ImageSize::Large,
            "extralarge" => ImageSize::ExtraLarge,
            "mega" => ImageSize::Mega,
            _ => ImageSize::Unknown,
        }
    }

    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// A downloaded cover image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Artwork {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// File name for uploads, with an extension matching the content type
    pub fn file_name(&self) -> String {
        let ext = match self.content_type.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "jpg",
        };
        format!("cover.{}", ext)
    }
}

/// Pick the largest image with a non-empty URL.
///
/// Ties keep the first candidate seen. Returns `None` when nothing usable
/// is listed.
pub fn select_best_image(track: &TrackRecord) -> Option<&str> {
    let mut best: Option<(&str, ImageSize)> = None;

    for candidate in &track.images {
        if candidate.url.is_empty() {
            continue;
        }

        let size = ImageSize::from_label(&candidate.size);
        match best {
            Some((_, best_size)) if size <= best_size => {}
            _ => best = Some((candidate.url.as_str(), size)),
        }
    }

    best.map(|(url, _)| url)
}

/// True when `url` points at the generic placeholder art
pub fn is_placeholder(url: &str) -> bool {
    url.contains(PLACEHOLDER_SIGNATURE)
}

/// Alt text for an uploaded cover
pub fn cover_description(track: &TrackRecord) -> String {
    format!(
        "Album cover for {} by {}.",
        track.album.as_deref().unwrap_or(UNKNOWN_ALBUM),
        track.artist
    )
}

/// Download an image, refusing the placeholder art before any network I/O
pub async fn fetch_image(
    client: &reqwest::Client,
    url: &str,
    cancel: &Cancellation,
) -> Result<Artwork, ArtworkError> {
    if is_placeholder(url) {
        return Err(ArtworkError::Placeholder {
            url: url.to_string(),
        });
    }

    debug!(%url, "Downloading cover art");

    cancel
        .run(download(client, url))
        .await
        .ok_or(ArtworkError::Cancelled)?
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Artwork, ArtworkError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ArtworkError::Status {
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let bytes = response.bytes().await?;
    Ok(Artwork::new(bytes.to_vec(), content_type))
}

/// `ImageFetcher` backed by plain HTTP GETs
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(&self, url: &str, cancel: &Cancellation) -> Result<Artwork, ArtworkError> {
        fetch_image(&self.client, url, cancel).await
    }
}

/// Selects and downloads the best cover for a track
pub struct ArtworkResolver {
    fetcher: Box<dyn ImageFetcher>,
}

impl ArtworkResolver {
    pub fn new(fetcher: Box<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolve the cover for `track`
    pub async fn resolve(
        &self,
        track: &TrackRecord,
        cancel: &Cancellation,
    ) -> Result<Artwork, ArtworkError> {
        let url = select_best_image(track).ok_or(ArtworkError::NoImage)?;
        self.fetcher.fetch_image(url, cancel).await
    }
}
