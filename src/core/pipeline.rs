use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::core::fetcher::MediaFetcher;
use crate::core::query::normalize;
use crate::core::ranker::{aggregate, rank};
use crate::core::resolver::MediaResolver;
use crate::core::session::{MemorySessionStore, SessionStore};
use crate::error::{Error, Result};
use crate::models::{RankedResult, Track};
use crate::sources::mirror::ScrapedMirrorSource;
use crate::sources::streaming::StreamingApiSource;
use crate::sources::{search_or_empty, TrackSource};

/// Search, resolve and download, wired together.
pub struct Pipeline {
    mirror: Arc<dyn TrackSource>,
    streaming: Arc<dyn TrackSource>,
    resolver: MediaResolver,
    fetcher: MediaFetcher,
    sessions: Arc<dyn SessionStore>,
    session_ttl: Duration,
}

impl Pipeline {
    pub fn from_config(config: &Config) -> Result<Self> {
        let streaming = StreamingApiSource::new(&config.streaming, config.proxy.as_deref())
            .map_err(|e| Error::Config(format!("streaming source: {e}")))?;
        let mirror = ScrapedMirrorSource::new(&config.mirror)
            .map_err(|e| Error::Config(format!("mirror source: {e}")))?;
        let fetcher = MediaFetcher::new(&config.download, &config.mirror)?;
        let sessions = Arc::new(MemorySessionStore::new(config.session.capacity));

        Ok(Self::new(
            Arc::new(mirror),
            Arc::new(streaming),
            fetcher,
            sessions,
            config,
        ))
    }

    pub fn new(
        mirror: Arc<dyn TrackSource>,
        streaming: Arc<dyn TrackSource>,
        fetcher: MediaFetcher,
        sessions: Arc<dyn SessionStore>,
        config: &Config,
    ) -> Self {
        let resolver = MediaResolver::new(Arc::clone(&streaming), Arc::clone(&mirror), &config.resolver);
        Self {
            mirror,
            streaming,
            resolver,
            fetcher,
            sessions,
            session_ttl: config.session.ttl(),
        }
    }

    /// Queries both backends concurrently and ranks the merged results.
    /// A failing backend contributes nothing; only an empty query is an error.
    pub async fn search(&self, query: &str) -> Result<Vec<RankedResult>> {
        let key = normalize(query)?;

        let (mirror, streaming) = tokio::join!(
            search_or_empty(self.mirror.as_ref(), &key),
            search_or_empty(self.streaming.as_ref(), &key),
        );

        let ranked = rank(&key.text, aggregate(vec![mirror, streaming]));
        tracing::info!(query = %key.text, slug = %key.slug, results = ranked.len(), "search ranked");
        Ok(ranked)
    }

    /// Like `search`, and remembers the ranked tracks under `session`.
    pub async fn search_session(&self, session: &str, query: &str) -> Result<Vec<RankedResult>> {
        let ranked = self.search(query).await?;
        let tracks = ranked.iter().map(|r| r.track.clone()).collect();
        self.sessions.put(session, tracks, self.session_ttl);
        Ok(ranked)
    }

    /// Picks a track from the session's last search.
    pub fn select(&self, session: &str, index: usize) -> Option<Track> {
        self.sessions
            .get(session)
            .and_then(|tracks| tracks.into_iter().nth(index))
    }

    pub async fn resolve_and_download(&self, track: &Track) -> Result<Vec<u8>> {
        let url = self.resolver.resolve_playable(track).await?;
        match self.fetcher.download(&url, track.source).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                // The signed URL may have expired; resolve again next time.
                self.resolver.invalidate(track);
                tracing::warn!(source = %track.source, locator = %track.locator, error = %e, "download failed");
                Err(e)
            }
        }
    }

    pub async fn fetch_thumbnail(&self, track: &Track) -> Option<Vec<u8>> {
        let url = track.thumbnail.as_deref()?;
        self.fetcher.fetch_thumbnail(url).await
    }
}
