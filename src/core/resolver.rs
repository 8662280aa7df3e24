//! Locator → direct media URL, with a per-process cache.
//!
//! Each `(source, locator)` key owns one `OnceCell`. Concurrent callers for
//! the same key wait on the same upstream call; a failed call drops the cell
//! so the next selection retries instead of replaying the failure.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::{OnceCell, Semaphore};

use crate::config::ResolverConfig;
use crate::error::{Error, Result, SourceError};
use crate::models::{SourceKind, Track};
use crate::sources::TrackSource;

type CacheKey = (SourceKind, String);

#[derive(Default)]
struct Slots {
    cells: HashMap<CacheKey, Arc<OnceCell<String>>>,
    order: VecDeque<CacheKey>,
}

pub struct ResolutionCache {
    /// 0 means unbounded.
    capacity: usize,
    slots: Mutex<Slots>,
}

impl ResolutionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// The cell for `key`, created on first use. A lookup marks the key as
    /// most recently used.
    fn slot(&self, key: &CacheKey) -> Arc<OnceCell<String>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cell) = slots.cells.get(key).map(Arc::clone) {
            if let Some(pos) = slots.order.iter().position(|k| k == key) {
                if let Some(k) = slots.order.remove(pos) {
                    slots.order.push_back(k);
                }
            }
            return cell;
        }

        let cell = Arc::new(OnceCell::new());
        slots.cells.insert(key.clone(), Arc::clone(&cell));
        slots.order.push_back(key.clone());
        self.evict(&mut slots);
        cell
    }

    /// Drops least recently used cells while over capacity. A cell some
    /// caller still holds (in flight or being read) is never dropped, so the
    /// bound can be exceeded by the number of resolutions in progress.
    fn evict(&self, slots: &mut Slots) {
        if self.capacity == 0 {
            return;
        }
        while slots.cells.len() > self.capacity {
            let victim = slots
                .order
                .iter()
                .position(|k| slots.cells.get(k).is_some_and(|c| Arc::strong_count(c) == 1));
            let Some(pos) = victim else {
                break;
            };
            if let Some(k) = slots.order.remove(pos) {
                slots.cells.remove(&k);
            }
        }
    }

    /// Removes `cell` after a failed resolution, unless it got a value or
    /// another caller is still waiting on it.
    fn discard_failed(&self, key: &CacheKey, cell: &Arc<OnceCell<String>>) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let stale = slots.cells.get(key).is_some_and(|c| {
            Arc::ptr_eq(c, cell) && !c.initialized() && Arc::strong_count(c) <= 2
        });
        if stale {
            slots.cells.remove(key);
            slots.order.retain(|k| k != key);
        }
    }

    #[cfg(test)]
    pub fn get(&self, source: SourceKind, locator: &str) -> Option<String> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .cells
            .get(&(source, locator.to_string()))
            .and_then(|cell| cell.get().cloned())
    }

    pub fn remove(&self, source: SourceKind, locator: &str) {
        let key = (source, locator.to_string());
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.cells.remove(&key).is_some() {
            slots.order.retain(|k| k != &key);
        }
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.cells.values().filter(|c| c.initialized()).count()
    }
}

pub struct MediaResolver {
    streaming: Arc<dyn TrackSource>,
    mirror: Arc<dyn TrackSource>,
    permits: Semaphore,
    cache: ResolutionCache,
}

impl MediaResolver {
    pub fn new(
        streaming: Arc<dyn TrackSource>,
        mirror: Arc<dyn TrackSource>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            streaming,
            mirror,
            permits: Semaphore::new(config.max_concurrent.max(1)),
            cache: ResolutionCache::new(config.cache_capacity),
        }
    }

    fn adapter(&self, source: SourceKind) -> &dyn TrackSource {
        match source {
            SourceKind::StreamingApi => self.streaming.as_ref(),
            SourceKind::ScrapedMirror => self.mirror.as_ref(),
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Resolves a track's locator through its owning backend.
    pub async fn resolve_playable(&self, track: &Track) -> Result<String> {
        let key = (track.source, track.locator.clone());
        let cell = self.cache.slot(&key);
        if let Some(url) = cell.get() {
            tracing::debug!(source = %track.source, locator = %track.locator, "resolution cache hit");
            return Ok(url.clone());
        }

        let adapter = self.adapter(track.source);
        let resolved = cell
            .get_or_try_init(|| async {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| SourceError::NoMedia("resolver is shut down".to_string()))?;
                adapter.resolve(&track.locator).await
            })
            .await;

        match resolved {
            Ok(url) => {
                tracing::info!(
                    source = %track.source,
                    locator = %track.locator,
                    cached = self.cache.len(),
                    "resolved media url"
                );
                Ok(url.clone())
            }
            Err(e) => {
                self.cache.discard_failed(&key, &cell);
                tracing::warn!(source = %track.source, locator = %track.locator, error = %e, "resolution failed");
                Err(Error::NoResolvableMedia {
                    locator: track.locator.clone(),
                })
            }
        }
    }

    /// Forgets a cached URL, e.g. after the download it pointed at failed.
    pub fn invalidate(&self, track: &Track) {
        self.cache.remove(track.source, &track.locator);
    }
}
