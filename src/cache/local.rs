//! Process-local stand-in for the shared key-value tier.
//!
//! Used for single-instance deployments and tests when no shared store is
//! configured. Unbounded; expired entries are dropped lazily on read or in bulk via
//! [`LocalKvTier::purge_expired`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;

use super::tier::{CacheError, CacheTier};

#[derive(Default)]
pub struct LocalKvTier {
    entries: DashMap<String, (Bytes, Option<Instant>)>,
}

impl LocalKvTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, (_, expires_at)| expires_at.is_none_or(|deadline| deadline > now));
        before - self.entries.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheTier for LocalKvTier {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) => match entry.1 {
                Some(deadline) if deadline <= now => true,
                _ => return Ok(Some(entry.0.clone())),
            },
            None => return Ok(None),
        };
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }
}
