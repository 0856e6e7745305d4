//! Rendered-listing storage.
//!
//! Entries carry their own creation time and lifetime; an entry is served
//! only while `now <= created_at + ttl` and is dropped on the first read
//! after that.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use time::OffsetDateTime;
use tracing::debug;

use crate::util::clock::Clock;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_HIT: &str = "archive_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "archive_cache_miss_total";
pub const METRIC_CACHE_STORE: &str = "archive_cache_store_total";
pub const METRIC_CACHE_EVICT: &str = "archive_cache_evict_total";
pub const METRIC_CACHE_INVALIDATE: &str = "archive_cache_invalidate_total";

/// Expiring key/value store for rendered listings.
pub trait ArchiveCache: Send + Sync {
    /// Payload stored under `key`, if present and not yet expired.
    fn get(&self, key: &CacheKey) -> Option<Bytes>;

    /// Store `payload` for `ttl`, replacing any previous entry.
    fn put(&self, key: CacheKey, payload: Bytes, ttl: Duration);

    /// Drop every entry whose key starts with `prefix`.
    fn invalidate(&self, prefix: &str);

    /// Drop every entry.
    fn clear(&self);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Bytes,
    created_at: OffsetDateTime,
    ttl: Duration,
}

impl CacheEntry {
    /// A lifetime reaching past the representable calendar never expires.
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        time::Duration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| self.created_at.checked_add(ttl))
            .is_none_or(|expires_at| now <= expires_at)
    }
}

/// Process-local [`ArchiveCache`] bounded by LRU eviction.
pub struct MemoryCache {
    entries: RwLock<LruCache<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArchiveCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        let fresh = match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.payload.clone()),
            Some(_) => {
                entries.pop(key);
                debug!(target = "content_archive::cache", key = %key, "expired cache entry dropped");
                None
            }
            None => None,
        };

        match fresh {
            Some(payload) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                Some(payload)
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                None
            }
        }
    }

    fn put(&self, key: CacheKey, payload: Bytes, ttl: Duration) {
        let entry = CacheEntry {
            payload,
            created_at: self.clock.now(),
            ttl,
        };
        let replaced = rw_write(&self.entries, SOURCE, "put").push(key.clone(), entry);

        counter!(METRIC_CACHE_STORE).increment(1);
        if let Some((evicted, _)) = replaced
            && evicted != key
        {
            counter!(METRIC_CACHE_EVICT).increment(1);
            debug!(target = "content_archive::cache", key = %evicted, "cache entry evicted");
        }
    }

    fn invalidate(&self, prefix: &str) {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, _)| key.has_prefix(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        drop(entries);

        counter!(METRIC_CACHE_INVALIDATE).increment(1);
        debug!(
            target = "content_archive::cache",
            prefix,
            removed = doomed.len(),
            "cache namespace invalidated"
        );
    }

    fn clear(&self) {
        let removed = {
            let mut entries = rw_write(&self.entries, SOURCE, "clear");
            let removed = entries.len();
            entries.clear();
            removed
        };

        counter!(METRIC_CACHE_INVALIDATE).increment(1);
        debug!(target = "content_archive::cache", removed, "cache cleared");
    }
}
