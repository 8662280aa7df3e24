use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::Track;

/// Where the delivery layer parks a user's last result list until they pick
/// a track from it.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<Track>>;
    fn put(&self, key: &str, tracks: Vec<Track>, ttl: Duration);
}

struct Entry {
    tracks: Vec<Track>,
    /// `None` when the TTL is too large to represent.
    expires_at: Option<Instant>,
    last_used: u64,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

struct Inner {
    entries: HashMap<String, Entry>,
    tick: u64,
}

/// In-memory store with a size bound (least recently used entry goes first)
/// and per-entry expiry.
pub struct MemorySessionStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl MemorySessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
            }),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        inner.entries.values().filter(|e| !e.expired(now)).count()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<Vec<Track>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.tick += 1;
        let tick = inner.tick;

        let expired = match inner.entries.get_mut(key) {
            None => return None,
            Some(entry) if entry.expired(Instant::now()) => true,
            Some(entry) => {
                entry.last_used = tick;
                return Some(entry.tracks.clone());
            }
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    fn put(&self, key: &str, tracks: Vec<Track>, ttl: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.tick += 1;
        let tick = inner.tick;
        let now = Instant::now();

        inner.entries.retain(|_, e| !e.expired(now));
        if !inner.entries.contains_key(key) && inner.entries.len() >= self.capacity {
            let lru = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(lru) = lru {
                inner.entries.remove(&lru);
            }
        }

        inner.entries.insert(
            key.to_string(),
            Entry {
                tracks,
                expires_at: now.checked_add(ttl),
                last_used: tick,
            },
        );
    }
}
