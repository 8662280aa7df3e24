pub mod mirror;
pub mod streaming;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::{SearchKey, SourceKind, Track};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A track catalog: text search plus locator resolution.
/// The streaming API and the scraped mirror both sit behind this trait.
#[async_trait]
pub trait TrackSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Searches the catalog. Any failure is reported as an error; callers
    /// decide whether to degrade it to "no results".
    async fn search(&self, key: &SearchKey) -> Result<Vec<Track>, SourceError>;

    /// Exchanges a locator produced by `search` for a direct media URL.
    async fn resolve(&self, locator: &str) -> Result<String, SourceError>;
}

/// Runs a search and flattens errors to an empty list, logging why.
pub async fn search_or_empty(source: &dyn TrackSource, key: &SearchKey) -> Vec<Track> {
    match source.search(key).await {
        Ok(tracks) => {
            tracing::info!(source = %source.kind(), count = tracks.len(), "search finished");
            tracks
        }
        Err(e) => {
            tracing::warn!(source = %source.kind(), error = %e, "search backend unavailable");
            Vec::new()
        }
    }
}

fn http_client(timeout: Duration, proxy: Option<&str>) -> Result<reqwest::Client, SourceError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .timeout(timeout);
    if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    Ok(builder.build()?)
}

fn check_status(response: &reqwest::Response) -> Result<(), SourceError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(SourceError::Unavailable {
            status: status.as_u16(),
        })
    }
}
