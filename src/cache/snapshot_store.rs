//! Multi-tier template snapshot lookup.
//!
//! Tiers are consulted in order: in-process memory, shared key-value store,
//! precompiled artifacts, raw corpus. A hit at a slower tier is written back to
//! every faster tier. The in-process write happens inline so the very next lookup
//! on this instance is served from memory; the shared and artifact writes run as a
//! detached background task whose failures are logged and counted but never reach
//! the caller.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{error::DomainError, snapshot::TemplateSnapshot};

use super::config::{CacheConfig, Tier};
use super::corpus::SnapshotCorpus;
use super::keys::template_key;
use super::memory::MemoryTier;
use super::tier::{CacheError, CacheTier};

const SOURCE: &str = "cache::snapshot_store";

pub(crate) const METRIC_TIER_HIT: &str = "storefront_snapshot_tier_hit_total";
pub(crate) const METRIC_MISS: &str = "storefront_snapshot_miss_total";
pub(crate) const METRIC_BACKFILL_FAILED: &str = "storefront_snapshot_backfill_failed_total";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("template `{0}` not found in any tier")]
    NotFound(String),
    #[error("template `{template_id}` could not be normalized: {source}")]
    Invalid {
        template_id: String,
        #[source]
        source: DomainError,
    },
    #[error("template corpus lookup failed: {0}")]
    Corpus(#[source] CacheError),
}

pub struct SnapshotStore {
    memory: Arc<MemoryTier>,
    shared: Arc<dyn CacheTier>,
    artifacts: Arc<dyn CacheTier>,
    corpus: Arc<dyn SnapshotCorpus>,
    config: CacheConfig,
}

impl SnapshotStore {
    pub fn new(
        config: CacheConfig,
        shared: Arc<dyn CacheTier>,
        artifacts: Arc<dyn CacheTier>,
        corpus: Arc<dyn SnapshotCorpus>,
    ) -> Self {
        Self {
            memory: Arc::new(MemoryTier::new(&config)),
            shared,
            artifacts,
            corpus,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The cross-instance tier, also written by the refresh daemon.
    pub fn shared(&self) -> Arc<dyn CacheTier> {
        Arc::clone(&self.shared)
    }

    pub async fn resolve(&self, template_id: &str) -> Result<TemplateSnapshot, SnapshotError> {
        let key = template_key(template_id);

        if let Some(snapshot) = self.read_tier(Tier::Memory, &*self.memory, &key).await {
            record_hit(Tier::Memory);
            return Ok(snapshot);
        }

        if let Some(snapshot) = self.read_tier(Tier::Shared, &*self.shared, &key).await {
            record_hit(Tier::Shared);
            self.promote(&key, template_id, &snapshot, Tier::Shared).await;
            return Ok(snapshot);
        }

        if let Some(snapshot) = self
            .read_tier(Tier::Artifact, &*self.artifacts, template_id)
            .await
        {
            record_hit(Tier::Artifact);
            self.promote(&key, template_id, &snapshot, Tier::Artifact).await;
            return Ok(snapshot);
        }

        let Some(record) = self
            .corpus
            .find(template_id)
            .await
            .map_err(SnapshotError::Corpus)?
        else {
            counter!(METRIC_MISS).increment(1);
            debug!(target = SOURCE, template_id, "template not found in any tier");
            return Err(SnapshotError::NotFound(template_id.to_string()));
        };

        let snapshot =
            TemplateSnapshot::normalize(&record).map_err(|source| SnapshotError::Invalid {
                template_id: template_id.to_string(),
                source,
            })?;
        record_hit(Tier::Corpus);
        self.promote(&key, template_id, &snapshot, Tier::Corpus).await;
        Ok(snapshot)
    }

    /// A tier that errors or holds an undecodable entry is treated as a miss.
    async fn read_tier(
        &self,
        tier: Tier,
        store: &dyn CacheTier,
        key: &str,
    ) -> Option<TemplateSnapshot> {
        let bytes = match store.get(key).await {
            Ok(bytes) => bytes?,
            Err(err) => {
                warn!(target = SOURCE, tier = tier.as_str(), key, error = %err, "cache tier read failed");
                return None;
            }
        };
        match TemplateSnapshot::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(target = SOURCE, tier = tier.as_str(), key, error = %err, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Write a snapshot found at `found` into every faster tier.
    async fn promote(&self, key: &str, template_id: &str, snapshot: &TemplateSnapshot, found: Tier) {
        let encoded = match serde_json::to_vec(snapshot) {
            Ok(encoded) => Bytes::from(encoded),
            Err(err) => {
                warn!(target = SOURCE, template_id, error = %err, "failed to encode snapshot for backfill");
                return;
            }
        };

        // Infallible for the memory tier.
        let _ = self.memory.set(key, encoded.clone(), None).await;

        let targets: Vec<(Tier, Arc<dyn CacheTier>, String, Option<std::time::Duration>)> =
            match found {
                Tier::Memory | Tier::Shared => Vec::new(),
                Tier::Artifact => vec![(
                    Tier::Shared,
                    Arc::clone(&self.shared),
                    key.to_string(),
                    Some(self.config.shared_ttl),
                )],
                Tier::Corpus => vec![
                    (
                        Tier::Shared,
                        Arc::clone(&self.shared),
                        key.to_string(),
                        Some(self.config.shared_ttl),
                    ),
                    (
                        Tier::Artifact,
                        Arc::clone(&self.artifacts),
                        template_id.to_string(),
                        None,
                    ),
                ],
            };
        if targets.is_empty() {
            return;
        }

        // Fire and forget; failures are only counted.
        let _ = tokio::spawn(async move {
            for (tier, store, key, ttl) in targets {
                if let Err(err) = store.set(&key, encoded.clone(), ttl).await {
                    counter!(METRIC_BACKFILL_FAILED, "tier" => tier.as_str()).increment(1);
                    warn!(target = SOURCE, tier = tier.as_str(), key, error = %err, "snapshot backfill failed");
                }
            }
        });
    }
}

fn record_hit(tier: Tier) {
    counter!(METRIC_TIER_HIT, "tier" => tier.as_str()).increment(1);
}
