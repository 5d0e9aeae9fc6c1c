//! Byte-level cache tier interface shared by every storage backend.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("invalid cache key `{key}`: {reason}")]
    InvalidKey { key: String, reason: &'static str },
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// A cache tier storing opaque bytes.
///
/// `ttl = None` keeps the entry until it is overwritten (or evicted by capacity).
#[async_trait]
pub trait CacheTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), CacheError>;
}

/// Read and decode a JSON entry.
pub async fn get_json<T>(tier: &dyn CacheTier, key: &str) -> Result<Option<T>, CacheError>
where
    T: DeserializeOwned,
{
    match tier.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON entry.
pub async fn set_json<T>(
    tier: &dyn CacheTier,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), CacheError>
where
    T: Serialize + ?Sized,
{
    let encoded = serde_json::to_vec(value)?;
    tier.set(key, Bytes::from(encoded), ttl).await
}
