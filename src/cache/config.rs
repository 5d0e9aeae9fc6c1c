//! Cache configuration.
//!
//! There is no invalidation protocol: every tier is bounded only by its TTL, so the
//! values below double as the staleness bound of each tier.

use std::num::NonZeroUsize;
use std::time::Duration;

// Default values for cache configuration
const DEFAULT_MEMORY_CAPACITY: usize = 500;
const DEFAULT_MEMORY_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SHARED_TTL_SECS: u64 = 6 * 60 * 60;
const DEFAULT_MERGED_TTL_SECS: u64 = 5 * 60;
const DEFAULT_BLOCK_TTL_SECS: u64 = 60 * 60;

/// Cache tiers in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Bounded in-process LRU, instance-local.
    Memory,
    /// Cross-instance key-value store.
    Shared,
    /// Durable precompiled artifacts, no TTL.
    Artifact,
    /// Raw template records, the source of truth.
    Corpus,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Memory => "memory",
            Tier::Shared => "shared",
            Tier::Artifact => "artifact",
            Tier::Corpus => "corpus",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum templates held in the in-process tier.
    pub memory_capacity: usize,
    /// Expiry of in-process entries.
    pub memory_ttl: Duration,
    /// Expiry of shared-tier template entries written by backfill.
    pub shared_ttl: Duration,
    /// Expiry of whole-result (`merged:`) entries.
    pub merged_ttl: Duration,
    /// Expiry of pre-rendered block entries.
    pub block_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            memory_ttl: Duration::from_secs(DEFAULT_MEMORY_TTL_SECS),
            shared_ttl: Duration::from_secs(DEFAULT_SHARED_TTL_SECS),
            merged_ttl: Duration::from_secs(DEFAULT_MERGED_TTL_SECS),
            block_ttl: Duration::from_secs(DEFAULT_BLOCK_TTL_SECS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            memory_capacity: settings.memory_capacity.get(),
            memory_ttl: settings.memory_ttl,
            shared_ttl: settings.shared_ttl,
            merged_ttl: settings.merged_ttl,
            block_ttl: settings.block_ttl,
        }
    }
}

impl CacheConfig {
    /// Returns the in-process capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Longest time a template tier may serve a stale snapshot; `None` is unbounded.
    pub fn staleness_bounds(&self) -> [(Tier, Option<Duration>); 3] {
        [
            (Tier::Memory, Some(self.memory_ttl)),
            (Tier::Shared, Some(self.shared_ttl)),
            (Tier::Artifact, None),
        ]
    }
}
