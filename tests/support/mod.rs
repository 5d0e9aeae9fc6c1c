//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use storefront::application::origin::{Origin, OriginError};
use storefront::cache::{CacheConfig, CacheError, LocalKvTier, SnapshotCorpus, SnapshotStore};
use storefront::domain::entities::{PageRecord, ProductRecord, TenantRecord};

#[derive(Default)]
pub struct Calls {
    pub tenant: AtomicUsize,
    pub page: AtomicUsize,
    pub product: AtomicUsize,
    pub template: AtomicUsize,
    pub list_tenants: AtomicUsize,
    pub list_products: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Origin backed by maps; lookups for tenants in `broken` fail.
#[derive(Default)]
pub struct FakeOrigin {
    pub tenants: Vec<TenantRecord>,
    pub pages: HashMap<(String, String), PageRecord>,
    pub products: HashMap<(String, String), ProductRecord>,
    pub templates: HashMap<String, Value>,
    pub listings: HashMap<String, Vec<Value>>,
    pub broken: HashSet<String>,
    pub fail_listing: bool,
    pub fail_tenant_lookup: bool,
    pub calls: Calls,
}

impl FakeOrigin {
    pub fn with_tenant(mut self, tenant: TenantRecord) -> Self {
        self.tenants.push(tenant);
        self
    }

    pub fn with_page(mut self, tenant_id: &str, page: PageRecord) -> Self {
        self.pages
            .insert((tenant_id.to_string(), page.slug.clone()), page);
        self
    }

    pub fn with_product(mut self, tenant_id: &str, product: ProductRecord) -> Self {
        self.products
            .insert((tenant_id.to_string(), product.slug.clone()), product);
        self
    }

    pub fn with_template(mut self, template_id: &str, record: Value) -> Self {
        self.templates.insert(template_id.to_string(), record);
        self
    }

    fn is_broken(&self, key: &str) -> bool {
        self.broken.contains(key)
    }
}

#[async_trait]
impl Origin for FakeOrigin {
    async fn fetch_tenant_by_id(&self, tenant_id: &str) -> Result<Option<TenantRecord>, OriginError> {
        self.calls.tenant.fetch_add(1, Ordering::SeqCst);
        if self.fail_tenant_lookup {
            return Err(OriginError::Transport("connection refused".into()));
        }
        Ok(self.tenants.iter().find(|tenant| tenant.id == tenant_id).cloned())
    }

    async fn fetch_page_by_slug(&self, tenant_id: &str, slug: &str) -> Result<Option<PageRecord>, OriginError> {
        self.calls.page.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.get(&(tenant_id.to_string(), slug.to_string())).cloned())
    }

    async fn fetch_product_by_slug(
        &self,
        tenant_id: &str,
        slug: &str,
    ) -> Result<Option<ProductRecord>, OriginError> {
        self.calls.product.fetch_add(1, Ordering::SeqCst);
        Ok(self.products.get(&(tenant_id.to_string(), slug.to_string())).cloned())
    }

    async fn fetch_template_snapshot(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> Result<Option<Value>, OriginError> {
        self.calls.template.fetch_add(1, Ordering::SeqCst);
        if self.is_broken(tenant_id) {
            return Err(OriginError::Status {
                resource: format!("/api/templates/{tenant_id}/{template_id}/snapshot"),
                status: 502,
            });
        }
        Ok(self.templates.get(template_id).cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, OriginError> {
        self.calls.list_tenants.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(OriginError::Status {
                resource: "/api/tenants".into(),
                status: 503,
            });
        }
        Ok(self.tenants.clone())
    }

    async fn list_products(&self, tenant_slug: &str) -> Result<Vec<Value>, OriginError> {
        self.calls.list_products.fetch_add(1, Ordering::SeqCst);
        if self.is_broken(tenant_slug) {
            return Err(OriginError::Transport("timed out".into()));
        }
        Ok(self.listings.get(tenant_slug).cloned().unwrap_or_default())
    }
}

/// Corpus backed by a map, counting lookups.
#[derive(Default)]
pub struct MapCorpus {
    pub records: HashMap<String, Value>,
    pub lookups: AtomicUsize,
}

impl MapCorpus {
    pub fn with(mut self, template_id: &str, record: Value) -> Self {
        self.records.insert(template_id.to_string(), record);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotCorpus for MapCorpus {
    async fn find(&self, template_id: &str) -> Result<Option<Value>, CacheError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.get(template_id).cloned())
    }
}

pub fn tenant(id: &str, slug: &str, template: Option<&str>) -> TenantRecord {
    let mut tenant = TenantRecord::new(id, slug);
    tenant.template = template.map(str::to_string);
    tenant
}

pub fn page(slug: &str, content: Value) -> PageRecord {
    serde_json::from_value(json!({ "id": format!("page-{slug}"), "slug": slug, "puckData": content }))
        .expect("page record")
}

pub fn modern_template() -> Value {
    json!({
        "templateId": "modern",
        "version": "1.4.0",
        "tokens": { "color": { "primary": "#111" }, "radius": 4 },
        "components": [
            { "id": "hero", "type": "Hero", "props": { "title": "Welcome", "align": "center" } },
            { "id": "grid", "type": "ProductGrid", "props": { "columns": 3 },
              "children": [{ "type": "ProductCard" }] }
        ]
    })
}

/// Snapshot store with in-process shared and artifact tiers.
pub fn snapshot_store(corpus: Arc<MapCorpus>) -> (Arc<SnapshotStore>, Arc<LocalKvTier>) {
    let shared = Arc::new(LocalKvTier::new());
    let store = SnapshotStore::new(
        CacheConfig::default(),
        shared.clone(),
        Arc::new(LocalKvTier::new()),
        corpus,
    );
    (Arc::new(store), shared)
}
