//! Pre-rendered block HTML, scoped by tenant and page fingerprint.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::fingerprint::PageFingerprint;

use super::config::CacheConfig;
use super::keys::block_key;
use super::tier::{CacheTier, get_json, set_json};

const SOURCE: &str = "cache::block";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CachedBlock {
    html: String,
}

/// Block fragments are best effort: read and write failures are logged and treated
/// as misses.
#[derive(Clone)]
pub struct BlockCache {
    tier: Arc<dyn CacheTier>,
    ttl: Duration,
}

impl BlockCache {
    pub fn new(tier: Arc<dyn CacheTier>, ttl: Duration) -> Self {
        Self { tier, ttl }
    }

    /// Block cache on `tier` with the configured `block_ttl`.
    pub fn from_config(tier: Arc<dyn CacheTier>, config: &CacheConfig) -> Self {
        Self::new(tier, config.block_ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(
        &self,
        tenant_slug: &str,
        fingerprint: &PageFingerprint,
        block_id: &str,
    ) -> Option<String> {
        let key = block_key(tenant_slug, fingerprint.as_str(), block_id);
        match get_json::<CachedBlock>(&*self.tier, &key).await {
            Ok(cached) => cached.map(|block| block.html),
            Err(err) => {
                warn!(target = SOURCE, key, error = %err, "block cache read failed");
                None
            }
        }
    }

    pub async fn set(
        &self,
        tenant_slug: &str,
        fingerprint: &PageFingerprint,
        block_id: &str,
        html: &str,
    ) {
        let key = block_key(tenant_slug, fingerprint.as_str(), block_id);
        let entry = CachedBlock {
            html: html.to_string(),
        };
        if let Err(err) = set_json(&*self.tier, &key, &entry, Some(self.ttl)).await {
            warn!(target = SOURCE, key, error = %err, "block cache write failed");
        }
    }
}
