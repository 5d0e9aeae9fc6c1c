//! Storefront cache tiers.
//!
//! - **Memory**: bounded in-process LRU with per-entry expiry
//! - **Shared**: cross-instance key-value store (Upstash REST, or [`LocalKvTier`])
//! - **Artifact**: durable precompiled snapshots on disk, no TTL
//! - **Corpus**: raw template records, the source of truth
//!
//! The [`SnapshotStore`] walks these tiers for template lookups. Whole-result,
//! block and product entries live in the shared tier under the keys in [`keys`].

mod artifact;
mod block;
mod config;
mod corpus;
pub mod keys;
mod local;
mod lock;
mod memory;
mod snapshot_store;
mod tier;

pub use artifact::ArtifactTier;
pub use block::BlockCache;
pub use config::{CacheConfig, Tier};
pub use corpus::{FsCorpus, SnapshotCorpus};
pub use local::LocalKvTier;
pub use memory::MemoryTier;
pub use snapshot_store::{SnapshotError, SnapshotStore};
pub use tier::{CacheError, CacheTier, get_json, set_json};

pub(crate) use memory::METRIC_MEMORY_EVICT;
pub(crate) use snapshot_store::{METRIC_BACKFILL_FAILED, METRIC_MISS, METRIC_TIER_HIT};
