//! Last.fm client for the most recent scrobble.
//!
//! Endpoint: GET https://ws.audioscrobbler.com/2.0/
//! Query: method=user.getrecenttracks, user, api_key, format=json, limit=1

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::TrackSource;
use crate::core::Cancellation;
use crate::domain::{ImageCandidate, TrackRecord};

/// Default API root
pub const DEFAULT_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Errors that can occur fetching the latest track
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid Last.fm URL: {0}")]
    Url(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Last.fm returned status {status}{}", detail(.message))]
    Status { status: u16, message: Option<String> },

    #[error("Last.fm API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Failed to parse Last.fm response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Last.fm returned no recent tracks")]
    NoTracks,

    #[error("Fetch cancelled")]
    Cancelled,
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

/// Last.fm API client for one user
pub struct LastFmClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    api_key: String,
}

/// Error body Last.fm sends instead of data
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    recenttracks: RecentTracks,
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: OneOrMany<ApiTrack>,
}

/// Last.fm collapses single-element lists into a bare object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(items) => items.into_iter().next(),
            OneOrMany::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist: TextField,
    #[serde(default)]
    album: TextField,
    #[serde(default)]
    image: Vec<ApiImage>,
    /// Missing while the track is still playing
    date: Option<ApiDate>,
}

#[derive(Debug, Default, Deserialize)]
struct TextField {
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    #[serde(rename = "#text", default)]
    url: String,
    #[serde(default)]
    size: String,
}

#[derive(Debug, Deserialize)]
struct ApiDate {
    #[serde(default)]
    uts: String,
}

impl From<ApiTrack> for TrackRecord {
    fn from(t: ApiTrack) -> Self {
        TrackRecord {
            name: t.name,
            artist: t.artist.text,
            album: Some(t.album.text).filter(|a| !a.is_empty()),
            images: t
                .image
                .into_iter()
                .map(|i| ImageCandidate::new(i.url, i.size))
                .collect(),
            marker: t.date.map(|d| d.uts).unwrap_or_default(),
        }
    }
}

impl LastFmClient {
    /// Create a client against the public API
    pub fn new(client: reqwest::Client, username: String, api_key: String) -> Self {
        Self::with_base_url(client, DEFAULT_API_URL, username, api_key)
    }

    /// Create a client against a custom API root
    pub fn with_base_url(
        client: reqwest::Client,
        base_url: impl Into<String>,
        username: String,
        api_key: String,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            username,
            api_key,
        }
    }

    /// Username whose scrobbles are fetched
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Build the request URL with escaped query parameters
    pub fn request_url(&self) -> Result<Url, FetchError> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("method", "user.getrecenttracks"),
                ("user", self.username.as_str()),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
                ("limit", "1"),
            ],
        )
        .map_err(|e| FetchError::Url(e.to_string()))?;
        Ok(url)
    }

    async fn get_body(&self, url: Url) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .map(|e| e.message)
                .filter(|m| !m.is_empty());
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl TrackSource for LastFmClient {
    fn name(&self) -> &str {
        "lastfm"
    }

    async fn fetch_latest(&self, cancel: &Cancellation) -> Result<TrackRecord, FetchError> {
        let url = self.request_url()?;
        debug!(user = %self.username, "Fetching most recent track");

        let body = cancel
            .run(self.get_body(url))
            .await
            .ok_or(FetchError::Cancelled)??;

        parse_recent_tracks(&body)
    }
}

/// Parse a `user.getrecenttracks` body and keep the first entry
pub fn parse_recent_tracks(body: &str) -> Result<TrackRecord, FetchError> {
    let value: serde_json::Value = serde_json::from_str(body)?;

    if value.get("error").is_some() {
        let err: ApiErrorBody = serde_json::from_value(value)?;
        return Err(FetchError::Api {
            code: err.error,
            message: err.message,
        });
    }

    let response: RecentTracksResponse = serde_json::from_value(value)?;
    response
        .recenttracks
        .track
        .into_first()
        .map(TrackRecord::from)
        .ok_or(FetchError::NoTracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(username: &str, api_key: &str) -> LastFmClient {
        LastFmClient::new(
            reqwest::Client::new(),
            username.to_string(),
            api_key.to_string(),
        )
    }

    #[test]
    fn test_request_url_parameters() {
        let url = client("rj", "KEY").request_url().unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(url.host_str(), Some("ws.audioscrobbler.com"));
        assert!(pairs.contains(&("method".into(), "user.getrecenttracks".into())));
        assert!(pairs.contains(&("user".into(), "rj".into())));
        assert!(pairs.contains(&("api_key".into(), "KEY".into())));
        assert!(pairs.contains(&("format".into(), "json".into())));
        assert!(pairs.contains(&("limit".into(), "1".into())));
    }

    #[test]
    fn test_request_url_escapes_values() {
        let url = client("a&b=c d", "k#1?x").request_url().unwrap();
        let query = url.query().unwrap();

        // Injected separators must not create extra parameters
        assert!(!query.contains("&b=c"));
        assert!(!url.as_str().contains('#'));

        let user: Vec<String> = url
            .query_pairs()
            .filter(|(k, _)| k == "user")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(user, vec!["a&b=c d".to_string()]);

        let key: Vec<String> = url
            .query_pairs()
            .filter(|(k, _)| k == "api_key")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(key, vec!["k#1?x".to_string()]);
    }

    #[test]
    fn test_parse_first_track() {
        let json = r##"{
            "recenttracks": {
                "track": [
                    {
                        "name": "Roygbiv",
                        "artist": {"mbid": "", "#text": "Boards of Canada"},
                        "album": {"mbid": "", "#text": "Music Has the Right to Children"},
                        "image": [
                            {"size": "small", "#text": "https://img/s.jpg"},
                            {"size": "extralarge", "#text": "https://img/xl.jpg"}
                        ],
                        "date": {"uts": "1700000000", "#text": "14 Nov 2023, 22:13"}
                    },
                    {
                        "name": "Older",
                        "artist": {"#text": "Someone"},
                        "album": {"#text": ""},
                        "date": {"uts": "1699999000"}
                    }
                ],
                "@attr": {"user": "rj", "page": "1", "totalPages": "10"}
            }
        }"##;

        let track = parse_recent_tracks(json).unwrap();
        assert_eq!(track.name, "Roygbiv");
        assert_eq!(track.artist, "Boards of Canada");
        assert_eq!(track.album.as_deref(), Some("Music Has the Right to Children"));
        assert_eq!(track.marker, "1700000000");
        assert_eq!(track.images.len(), 2);
        assert_eq!(track.images[1].size, "extralarge");
    }

    #[test]
    fn test_parse_now_playing_has_empty_marker() {
        let json = r##"{
            "recenttracks": {
                "track": [
                    {
                        "name": "Live",
                        "artist": {"#text": "A"},
                        "album": {"#text": ""},
                        "@attr": {"nowplaying": "true"}
                    }
                ]
            }
        }"##;

        let track = parse_recent_tracks(json).unwrap();
        assert_eq!(track.marker, "");
        assert_eq!(track.album, None);
    }

    #[test]
    fn test_parse_single_object_track() {
        let json = r##"{
            "recenttracks": {
                "track": {"name": "Solo", "artist": {"#text": "A"}, "date": {"uts": "5"}}
            }
        }"##;

        let track = parse_recent_tracks(json).unwrap();
        assert_eq!(track.name, "Solo");
        assert_eq!(track.marker, "5");
    }

    #[test]
    fn test_parse_empty_list_is_no_tracks() {
        let json = r##"{"recenttracks": {"track": [], "@attr": {"total": "0"}}}"##;
        assert!(matches!(parse_recent_tracks(json), Err(FetchError::NoTracks)));
    }

    #[test]
    fn test_parse_api_error_body() {
        let json = r##"{"error": 6, "message": "User not found"}"##;
        match parse_recent_tracks(json) {
            Err(FetchError::Api { code, message }) => {
                assert_eq!(code, 6);
                assert_eq!(message, "User not found");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(matches!(
            parse_recent_tracks("<html>oops</html>"),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn test_status_error_reports_code() {
        let err = FetchError::Status {
            status: 503,
            message: None,
        };
        assert_eq!(err.to_string(), "Last.fm returned status 503");

        let err = FetchError::Status {
            status: 403,
            message: Some("Invalid API key".to_string()),
        };
        assert_eq!(err.to_string(), "Last.fm returned status 403: Invalid API key");
    }

    #[tokio::test]
    async fn test_fetch_honours_cancellation() {
        let cancel = Cancellation::new();
        cancel.cancel();

        let result = client("rj", "KEY").fetch_latest(&cancel).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
