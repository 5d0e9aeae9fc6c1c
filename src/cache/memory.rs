//! Bounded in-process tier: LRU eviction plus per-entry expiry.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::lock_tier;
use super::tier::{CacheError, CacheTier};

const TIER: &str = "memory";
pub(crate) const METRIC_MEMORY_EVICT: &str = "storefront_cache_memory_evict_total";

struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Instance-local tier. Entries without an explicit TTL use the tier default.
pub struct MemoryTier {
    entries: Mutex<LruCache<String, Entry>>,
    default_ttl: Option<Duration>,
}

impl MemoryTier {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
            default_ttl: Some(config.memory_ttl),
        }
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        let mut entries = lock_tier(&self.entries, TIER, "get");
        let expired = entries.peek(key).map(|entry| entry.is_expired(now))?;
        if expired {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn store(&self, key: &str, value: Bytes, ttl: Option<Duration>) {
        let expires_at = ttl.or(self.default_ttl).map(|ttl| Instant::now() + ttl);
        let evicted = lock_tier(&self.entries, TIER, "set")
            .push(key.to_string(), Entry { value, expires_at })
            .filter(|(evicted_key, _)| evicted_key != key);
        if evicted.is_some() {
            counter!(METRIC_MEMORY_EVICT).increment(1);
        }
    }

    pub fn len(&self) -> usize {
        lock_tier(&self.entries, TIER, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.store(key, value, ttl);
        Ok(())
    }
}
