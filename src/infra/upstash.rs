//! Shared cache tier backed by an Upstash-compatible Redis REST endpoint.
//!
//! Each operation is one `POST` of a command array, e.g. `["GET", key]` or
//! `["SET", key, value, "EX", ttl]`, answered with `{"result": ...}` or
//! `{"error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::cache::{CacheError, CacheTier};

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct UpstashTier {
    client: Client,
    url: Url,
    token: String,
}

impl UpstashTier {
    pub fn new(url: Url, token: impl Into<String>, timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::builder()
            .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(CacheError::backend)?;
        Ok(Self {
            client,
            url,
            token: token.into(),
        })
    }

    async fn command(&self, command: Value) -> Result<Value, CacheError> {
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&command)
            .send()
            .await
            .map_err(CacheError::backend)?;

        let status = response.status();
        let body = response.bytes().await.map_err(CacheError::backend)?;
        let reply: Reply = serde_json::from_slice(&body).map_err(|err| {
            CacheError::backend(format!("status {status}, undecodable reply: {err}"))
        })?;
        if let Some(message) = reply.error {
            return Err(CacheError::Backend(message));
        }
        if !status.is_success() {
            return Err(CacheError::backend(format!("status {status}")));
        }
        Ok(reply.result)
    }
}

fn set_command(key: &str, value: &str, ttl: Option<Duration>) -> Value {
    match ttl {
        // Redis rejects `EX 0`.
        Some(ttl) => json!(["SET", key, value, "EX", ttl.as_secs().max(1)]),
        None => json!(["SET", key, value]),
    }
}

#[async_trait]
impl CacheTier for UpstashTier {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        match self.command(json!(["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(Bytes::from(text))),
            // Some clients store JSON natively; hand it back encoded.
            other => Ok(Some(Bytes::from(serde_json::to_vec(&other)?))),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), CacheError> {
        let text = std::str::from_utf8(&value)
            .map_err(|err| CacheError::backend(format!("value for `{key}` is not UTF-8: {err}")))?;
        self.command(set_command(key, text, ttl)).await?;
        Ok(())
    }
}
