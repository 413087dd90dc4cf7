use chrono::{DateTime, Duration, Utc};
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::config::CacheConfig;
use crate::layout_types::Dimension;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    dimension: Dimension,
    resolved_at: DateTime<Utc>,
}

/// Process-wide cache of resolved image dimensions, keyed by normalized
/// image reference. Entries are read-only after insertion and leave the
/// cache through LRU eviction, TTL expiry, or explicit invalidation when
/// the underlying image is replaced.
#[derive(Clone)]
pub struct DimensionCache {
    cache: Arc<Mutex<LruCache<String, CacheEntry>>>,
    ttl: Duration,
}

impl DimensionCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.dimension_capacity)
            .unwrap_or_else(|| NonZeroUsize::new(10_000).unwrap());

        DimensionCache {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            ttl: Duration::seconds(config.dimension_ttl_secs),
        }
    }

    /// HEAD and ranged probes treat the query string as cache-busting
    /// noise; the path identifies the image.
    pub fn normalize_reference(reference: &str) -> String {
        match reference.split_once('?') {
            Some((path, _)) => path.to_string(),
            None => reference.to_string(),
        }
    }

    pub fn get(&self, reference: &str) -> Option<Dimension> {
        let key = Self::normalize_reference(reference);

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(entry) = cache.get(&key) {
                if Utc::now() - entry.resolved_at < self.ttl {
                    debug!("Dimension cache hit for {}", key);
                    return Some(entry.dimension);
                }
                debug!("Dimension cache entry expired for {}", key);
                cache.pop(&key);
            }
        }

        debug!("Dimension cache miss for {}", key);
        None
    }

    pub fn put(&self, reference: &str, dimension: Dimension) {
        let key = Self::normalize_reference(reference);

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                key,
                CacheEntry {
                    dimension,
                    resolved_at: Utc::now(),
                },
            );
        }
    }

    /// Drops a single entry, e.g. when the image behind the reference was
    /// replaced with a differently sized upload.
    pub fn invalidate(&self, reference: &str) -> bool {
        let key = Self::normalize_reference(reference);

        if let Ok(mut cache) = self.cache.lock() {
            if cache.pop(&key).is_some() {
                debug!("Invalidated dimension cache entry for {}", key);
                return true;
            }
        }

        false
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
            debug!("Cleared dimension cache");
        }
    }

    /// Removes every expired entry; returns how many were dropped. Called
    /// from the maintenance sweep so long-idle entries don't pin capacity.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut dropped = 0;

        if let Ok(mut cache) = self.cache.lock() {
            let expired: Vec<String> = cache
                .iter()
                .filter(|(_, entry)| now - entry.resolved_at >= self.ttl)
                .map(|(key, _)| key.clone())
                .collect();

            for key in expired {
                cache.pop(&key);
                dropped += 1;
            }
        }

        dropped
    }

    pub fn stats(&self) -> (usize, usize) {
        if let Ok(cache) = self.cache.lock() {
            (cache.len(), cache.cap().get())
        } else {
            (0, 0)
        }
    }
}
