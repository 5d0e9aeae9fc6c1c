//! Origin trait describing the authoritative CMS data source.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::entities::{PageRecord, ProductRecord, TenantRecord};

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("origin request failed: {0}")]
    Transport(String),
    #[error("origin returned status {status} for `{resource}`")]
    Status { resource: String, status: u16 },
    #[error("origin response for `{resource}` could not be decoded: {message}")]
    Decode { resource: String, message: String },
    #[error("origin is misconfigured: {0}")]
    Configuration(String),
}

impl OriginError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(resource: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            resource: resource.into(),
            message: err.to_string(),
        }
    }
}

/// Read-only access to tenants, pages, products and raw templates.
///
/// Single-record lookups return `Ok(None)` when the record does not exist; errors are
/// reserved for transport or decoding failures.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch_tenant_by_id(&self, tenant_id: &str)
    -> Result<Option<TenantRecord>, OriginError>;

    async fn fetch_page_by_slug(
        &self,
        tenant_id: &str,
        slug: &str,
    ) -> Result<Option<PageRecord>, OriginError>;

    async fn fetch_product_by_slug(
        &self,
        tenant_id: &str,
        slug: &str,
    ) -> Result<Option<ProductRecord>, OriginError>;

    /// Raw, un-normalized template record.
    async fn fetch_template_snapshot(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> Result<Option<Value>, OriginError>;

    /// Every known tenant, for the refresh daemon.
    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, OriginError>;

    /// Product listing of one tenant, stored verbatim by the refresh daemon.
    async fn list_products(&self, tenant_slug: &str) -> Result<Vec<Value>, OriginError>;
}
