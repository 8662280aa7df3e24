use reqwest::header::REFERER;

use crate::config::{DownloadConfig, MirrorConfig};
use crate::error::{Error, Result};
use crate::models::SourceKind;
use crate::sources::streaming::STREAMING_REFERER;
use crate::sources::BROWSER_USER_AGENT;

/// Downloads resolved media URLs into memory.
pub struct MediaFetcher {
    client: reqwest::Client,
    min_bytes: usize,
    mirror_referer: String,
}

impl MediaFetcher {
    pub fn new(config: &DownloadConfig, mirror: &MirrorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            min_bytes: config.min_bytes,
            mirror_referer: mirror.referer(),
        })
    }

    fn referer(&self, source: SourceKind) -> &str {
        match source {
            SourceKind::StreamingApi => STREAMING_REFERER,
            SourceKind::ScrapedMirror => &self.mirror_referer,
        }
    }

    /// Fetches the whole body. Bodies under the configured minimum are
    /// rejected: some hosts answer 200 with a short error page or teaser.
    pub async fn download(&self, url: &str, source: SourceKind) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(REFERER, self.referer(source))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.len() < self.min_bytes {
            return Err(Error::CorruptOrTruncatedMedia {
                len: bytes.len(),
                min: self.min_bytes,
            });
        }

        tracing::info!(%source, bytes = bytes.len(), "download complete");
        Ok(bytes)
    }

    /// Best-effort cover download; any failure yields `None`.
    pub async fn fetch_thumbnail(&self, url: &str) -> Option<Vec<u8>> {
        let response = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(url, status = r.status().as_u16(), "cover not available");
                return None;
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "cover download failed");
                return None;
            }
        };
        response
            .bytes()
            .await
            .ok()
            .map(|b| b.to_vec())
            .filter(|b| !b.is_empty())
    }
}
