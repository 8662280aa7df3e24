use async_trait::async_trait;
use reqwest::header::REFERER;
use serde::Deserialize;

use crate::config::StreamingConfig;
use crate::error::SourceError;
use crate::models::{format_millis, SearchKey, SourceKind, Track};
use crate::sources::{check_status, http_client, TrackSource};

pub const PAGE_SIZE: u32 = 30;
pub const STREAMING_REFERER: &str = "https://soundcloud.com/";

const MP3_PRESET: &str = "mp3_1";
const PROGRESSIVE: &str = "progressive";

/// SoundCloud-style API client.
/// Search results carry a transcoding reference; `resolve` trades it for a
/// signed stream URL only once a track is actually picked.
pub struct StreamingApiSource {
    client: reqwest::Client,
    api_base: String,
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    collection: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ApiTrack {
    title: Option<String>,
    user: Option<ApiUser>,
    #[serde(default)]
    duration: u64,
    artwork_url: Option<String>,
    #[serde(default)]
    media: ApiMedia,
}

#[derive(Deserialize)]
struct ApiUser {
    username: Option<String>,
}

#[derive(Deserialize, Default)]
struct ApiMedia {
    #[serde(default)]
    transcodings: Vec<Transcoding>,
}

#[derive(Deserialize)]
struct Transcoding {
    url: String,
    preset: Option<String>,
    format: Option<TranscodingFormat>,
}

#[derive(Deserialize)]
struct TranscodingFormat {
    protocol: Option<String>,
}

#[derive(Deserialize)]
struct StreamResponse {
    url: Option<String>,
}

impl StreamingApiSource {
    pub fn new(config: &StreamingConfig, proxy: Option<&str>) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(config.timeout(), proxy)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone().filter(|id| !id.is_empty()),
        })
    }

    fn client_id(&self) -> Result<&str, SourceError> {
        self.client_id
            .as_deref()
            .ok_or(SourceError::NotConfigured("streaming client_id"))
    }

    /// The mp3 preset wins; otherwise the first progressive stream.
    fn pick_transcoding(transcodings: &[Transcoding]) -> Option<&str> {
        transcodings
            .iter()
            .find(|t| t.preset.as_deref() == Some(MP3_PRESET))
            .or_else(|| {
                transcodings.iter().find(|t| {
                    t.format.as_ref().and_then(|f| f.protocol.as_deref()) == Some(PROGRESSIVE)
                })
            })
            .map(|t| t.url.as_str())
    }

    fn convert_track(track: &ApiTrack) -> Option<Track> {
        let locator = Self::pick_transcoding(&track.media.transcodings)?;

        let artist = track
            .user
            .as_ref()
            .and_then(|u| u.username.clone())
            .unwrap_or_default();

        // "-large.jpg" is a 100px thumbnail; "-original" is full size.
        let thumbnail = track
            .artwork_url
            .as_ref()
            .map(|url| url.replace("large", "original"));

        Some(
            Track::new(
                track.title.clone().unwrap_or_default(),
                artist,
                format_millis(track.duration),
                SourceKind::StreamingApi,
                locator,
            )
            .with_thumbnail(thumbnail),
        )
    }
}

/// Parses a search response body. Items are decoded one by one, so a
/// malformed item or one without a usable transcoding is dropped alone.
pub fn parse_search_response(body: &str) -> Result<Vec<Track>, SourceError> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(resp
        .collection
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ApiTrack>(item) {
            Ok(track) => StreamingApiSource::convert_track(&track),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed streaming item");
                None
            }
        })
        .collect())
}

#[async_trait]
impl TrackSource for StreamingApiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::StreamingApi
    }

    async fn search(&self, key: &SearchKey) -> Result<Vec<Track>, SourceError> {
        let client_id = self.client_id()?;
        let url = format!("{}/search/tracks", self.api_base);
        let limit = PAGE_SIZE.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", key.text.as_str()),
                ("client_id", client_id),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;
        check_status(&response)?;

        let body = response.text().await?;
        parse_search_response(&body)
    }

    async fn resolve(&self, locator: &str) -> Result<String, SourceError> {
        let client_id = self.client_id()?;

        let response = self
            .client
            .get(locator)
            .query(&[("client_id", client_id)])
            .header(REFERER, STREAMING_REFERER)
            .send()
            .await?;
        check_status(&response)?;

        let body = response.text().await?;
        let stream: StreamResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))?;

        stream
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SourceError::NoMedia(format!("no url field for {locator}")))
    }
}
