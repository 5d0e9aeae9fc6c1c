//! Page resolution: tenant, page and product lookup, template merge, fingerprinting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
    application::{
        origin::{Origin, OriginError},
        registry::RendererRegistry,
    },
    cache::{CacheTier, SnapshotError, SnapshotStore, get_json, keys::merged_key, set_json},
    domain::{
        block::collect_types,
        entities::{PageRecord, ProductRecord, TenantRecord, effective_template_id},
        fingerprint::PageFingerprint,
        merge::merge,
        sanitize::{deserialize_untrusted, sanitize},
        snapshot::TemplateSnapshot,
    },
};

const SOURCE: &str = "application::resolver";

pub(crate) const METRIC_RESOLVE_CACHE_HIT: &str = "storefront_resolve_cache_hit_total";
pub(crate) const METRIC_RESOLVE_CACHE_MISS: &str = "storefront_resolve_cache_miss_total";
pub(crate) const METRIC_RESOLVE_MS: &str = "storefront_resolve_ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub use_cache: bool,
    pub preview: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            preview: false,
        }
    }
}

impl ResolveOptions {
    fn caching(self) -> bool {
        self.use_cache && !self.preview
    }
}

/// Everything needed to render one `(tenant, path)`.
///
/// Absent data is `None` (or an empty document) rather than an error; the page
/// being missing is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPage {
    pub tenant: TenantRecord,
    pub page: Option<PageRecord>,
    pub product: Option<ProductRecord>,
    pub template_snapshot: Option<TemplateSnapshot>,
    pub merged: Value,
    #[serde(rename = "pageHash")]
    pub fingerprint: PageFingerprint,
    #[serde(skip)]
    pub cache_hit: bool,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("tenant `{0}` not found")]
    TenantNotFound(String),
    #[error("tenant `{tenant_id}` lookup failed: {source}")]
    Origin {
        tenant_id: String,
        #[source]
        source: OriginError,
    },
}

pub struct PageResolver {
    origin: Arc<dyn Origin>,
    snapshots: Arc<SnapshotStore>,
    registry: Arc<RendererRegistry>,
    results: Arc<dyn CacheTier>,
    merged_ttl: Duration,
}

impl PageResolver {
    pub fn new(
        origin: Arc<dyn Origin>,
        snapshots: Arc<SnapshotStore>,
        registry: Arc<RendererRegistry>,
        results: Arc<dyn CacheTier>,
    ) -> Self {
        let merged_ttl = snapshots.config().merged_ttl;
        Self {
            origin,
            snapshots,
            registry,
            results,
            merged_ttl,
        }
    }

    #[instrument(skip(self), fields(use_cache = options.use_cache, preview = options.preview))]
    pub async fn resolve(
        &self,
        tenant_id: &str,
        path: &str,
        options: ResolveOptions,
    ) -> Result<ResolvedPage, ResolveError> {
        let started_at = Instant::now();

        let tenant = self
            .origin
            .fetch_tenant_by_id(tenant_id)
            .await
            .map_err(|source| ResolveError::Origin {
                tenant_id: tenant_id.to_string(),
                source,
            })?
            .ok_or_else(|| ResolveError::TenantNotFound(tenant_id.to_string()))?;

        let cache_key = merged_key(&tenant.slug, path);

        if options.caching() {
            if let Some(mut cached) = self.read_cached(&cache_key).await {
                counter!(METRIC_RESOLVE_CACHE_HIT).increment(1);
                cached.tenant = tenant;
                cached.cache_hit = true;
                return Ok(cached);
            }
            counter!(METRIC_RESOLVE_CACHE_MISS).increment(1);
        }

        let (product, page) = tokio::join!(
            self.origin.fetch_product_by_slug(&tenant.id, path),
            self.origin.fetch_page_by_slug(&tenant.id, path),
        );
        let product = absorb(product, "product", &tenant.slug, path);
        let page = absorb(page, "page", &tenant.slug, path);

        let page_content = page
            .as_ref()
            .and_then(|page| page.puck_data.as_ref())
            .and_then(|raw| match deserialize_untrusted(raw) {
                Ok(content) => content,
                Err(err) => {
                    warn!(target = SOURCE, tenant = %tenant.slug, path, error = %err, "page content discarded");
                    None
                }
            });

        let template_snapshot = match effective_template_id(product.as_ref(), page.as_ref(), &tenant)
        {
            Some(template_id) => self.load_template(&tenant.id, template_id).await,
            None => None,
        };

        let template_document = template_snapshot
            .as_ref()
            .and_then(|snapshot| serde_json::to_value(snapshot).ok())
            .unwrap_or_else(|| Value::Object(Map::new()));
        let tenant_overrides = tenant.overrides().cloned().map(sanitize).unwrap_or(Value::Null);
        let merged = merge(
            &template_document,
            &tenant_overrides,
            page_content.as_ref().unwrap_or(&Value::Null),
        );

        let fingerprint = PageFingerprint::compute(
            template_snapshot.as_ref().map(TemplateSnapshot::version_marker),
            &merged,
            product.as_ref().and_then(|product| product.id.as_deref()),
        );

        let kinds = collect_types(&merged);
        let loaded = self.registry.preload(&kinds).await;
        debug!(target = SOURCE, requested = kinds.len(), loaded, "renderers preloaded");

        let resolved = ResolvedPage {
            tenant,
            page,
            product,
            template_snapshot,
            merged,
            fingerprint,
            cache_hit: false,
        };

        if options.caching() {
            if let Err(err) = set_json(&*self.results, &cache_key, &resolved, Some(self.merged_ttl)).await
            {
                warn!(target = SOURCE, key = %cache_key, error = %err, "failed to cache resolved page");
            }
        }

        histogram!(METRIC_RESOLVE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        Ok(resolved)
    }

    /// Read and decode a cached bundle; failures count as a miss.
    async fn read_cached(&self, key: &str) -> Option<ResolvedPage> {
        match get_json::<ResolvedPage>(&*self.results, key).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(target = SOURCE, key, error = %err, "ignoring unreadable cached page");
                None
            }
        }
    }

    /// Fetch a template through the snapshot store, falling back to the origin when
    /// no tier knows it. Every failure degrades to `None`.
    async fn load_template(&self, tenant_id: &str, template_id: &str) -> Option<TemplateSnapshot> {
        let raw = match self.snapshots.resolve(template_id).await {
            Ok(snapshot) => serde_json::to_value(&snapshot).ok()?,
            Err(SnapshotError::NotFound(_)) => {
                match self.origin.fetch_template_snapshot(tenant_id, template_id).await {
                    Ok(Some(raw)) => raw,
                    Ok(None) => {
                        warn!(target = SOURCE, template_id, "template not found at origin");
                        return None;
                    }
                    Err(err) => {
                        warn!(target = SOURCE, template_id, error = %err, "template fetch failed");
                        return None;
                    }
                }
            }
            Err(err) => {
                warn!(target = SOURCE, template_id, error = %err, "template lookup failed");
                return None;
            }
        };

        let clean = sanitize(raw);
        if clean.is_null() {
            warn!(target = SOURCE, template_id, "template rejected by sanitizer");
            return None;
        }
        match TemplateSnapshot::normalize(&clean) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(target = SOURCE, template_id, error = %err, "template could not be normalized");
                None
            }
        }
    }
}

fn absorb<T>(
    result: Result<Option<T>, OriginError>,
    what: &'static str,
    tenant: &str,
    path: &str,
) -> Option<T> {
    result.unwrap_or_else(|err| {
        warn!(target = SOURCE, what, tenant, path, error = %err, "origin lookup degraded to absent");
        None
    })
}
