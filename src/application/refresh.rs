//! Background refresh of the shared template tier and per-tenant product listings.
//!
//! The daemon is the only writer that runs without a request. It shares nothing with
//! request handling except the cache tier it writes to; readers see its writes once
//! they land and otherwise serve whatever is cached until the entry's TTL runs out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{
    application::origin::{Origin, OriginError},
    cache::{CacheError, CacheTier, keys, set_json},
    domain::{entities::TenantRecord, error::DomainError, snapshot::TemplateSnapshot},
};

const SOURCE: &str = "application::refresh";

pub(crate) const METRIC_REFRESH_FAILED: &str = "storefront_refresh_failed_total";
pub(crate) const METRIC_REFRESH_SWEEP_MS: &str = "storefront_refresh_sweep_ms";

const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_TEMPLATE_TTL_SECS: u64 = 30 * 60;
const DEFAULT_PRODUCT_TTL_SECS: u64 = 2 * 60;

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Delay between the end of one tick and the start of the next.
    pub interval: Duration,
    pub template_ttl: Duration,
    pub product_ttl: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            template_ttl: Duration::from_secs(DEFAULT_TEMPLATE_TTL_SECS),
            product_ttl: Duration::from_secs(DEFAULT_PRODUCT_TTL_SECS),
        }
    }
}

impl From<&crate::config::RefreshSettings> for RefreshConfig {
    fn from(settings: &crate::config::RefreshSettings) -> Self {
        Self {
            interval: settings.interval,
            template_ttl: settings.template_ttl,
            product_ttl: settings.product_ttl,
        }
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("tenant listing failed: {0}")]
    Listing(#[source] OriginError),
    #[error(transparent)]
    Origin(#[from] OriginError),
    #[error("template `{0}` not found at origin")]
    MissingTemplate(String),
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    Templates,
    Products,
}

impl Sweep {
    pub fn as_str(self) -> &'static str {
        match self {
            Sweep::Templates => "templates",
            Sweep::Products => "products",
        }
    }
}

/// Outcome of one sweep over all tenants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub sweep: Sweep,
    pub refreshed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    fn new(sweep: Sweep) -> Self {
        Self {
            sweep,
            refreshed: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub templates: SweepReport,
    pub products: SweepReport,
}

pub struct CacheRefreshDaemon {
    origin: Arc<dyn Origin>,
    shared: Arc<dyn CacheTier>,
    config: RefreshConfig,
}

impl CacheRefreshDaemon {
    pub fn new(origin: Arc<dyn Origin>, shared: Arc<dyn CacheTier>, config: RefreshConfig) -> Self {
        Self {
            origin,
            shared,
            config,
        }
    }

    /// Start the loop on the runtime. The task only ends when aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    pub async fn run(&self) {
        info!(
            target = SOURCE,
            interval_secs = self.config.interval.as_secs(),
            "cache refresh daemon started"
        );
        loop {
            let report = self.tick().await;
            info!(
                target = SOURCE,
                templates_refreshed = report.templates.refreshed,
                templates_failed = report.templates.failed,
                products_refreshed = report.products.refreshed,
                products_failed = report.products.failed,
                "refresh tick completed"
            );
            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// One tick: the template sweep, then the product sweep.
    pub async fn tick(&self) -> TickReport {
        let templates = self.sweep(Sweep::Templates).await;
        let products = self.sweep(Sweep::Products).await;
        TickReport {
            templates,
            products,
        }
    }

    async fn sweep(&self, sweep: Sweep) -> SweepReport {
        let started_at = Instant::now();
        let mut report = SweepReport::new(sweep);

        let tenants = match self.origin.list_tenants().await {
            Ok(tenants) => tenants,
            Err(err) => {
                let err = RefreshError::Listing(err);
                counter!(METRIC_REFRESH_FAILED, "sweep" => sweep.as_str()).increment(1);
                error!(target = SOURCE, sweep = sweep.as_str(), error = %err, "sweep aborted");
                report.failed += 1;
                return report;
            }
        };

        // At most one origin call in flight per sweep.
        for tenant in &tenants {
            let outcome = match sweep {
                Sweep::Templates => self.refresh_template(tenant).await,
                Sweep::Products => self.refresh_products(tenant).await.map(|()| true),
            };
            match outcome {
                Ok(true) => report.refreshed += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    counter!(METRIC_REFRESH_FAILED, "sweep" => sweep.as_str()).increment(1);
                    error!(
                        target = SOURCE,
                        sweep = sweep.as_str(),
                        tenant = %tenant.slug,
                        error = %err,
                        "tenant refresh failed"
                    );
                }
            }
        }

        histogram!(METRIC_REFRESH_SWEEP_MS, "sweep" => sweep.as_str())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        report
    }

    /// Overwrite the shared template entry. `Ok(false)` when the tenant has no template.
    async fn refresh_template(&self, tenant: &TenantRecord) -> Result<bool, RefreshError> {
        let Some(template_id) = tenant.effective_template_id() else {
            debug!(target = SOURCE, tenant = %tenant.slug, "tenant has no template");
            return Ok(false);
        };

        let raw = self
            .origin
            .fetch_template_snapshot(&tenant.id, template_id)
            .await?
            .ok_or_else(|| RefreshError::MissingTemplate(template_id.to_string()))?;
        let snapshot = TemplateSnapshot::normalize(&raw)?;

        let key = keys::template_key(template_id);
        set_json(&*self.shared, &key, &snapshot, Some(self.config.template_ttl)).await?;
        debug!(target = SOURCE, tenant = %tenant.slug, key, "template refreshed");
        Ok(true)
    }

    async fn refresh_products(&self, tenant: &TenantRecord) -> Result<(), RefreshError> {
        let products = self.origin.list_products(&tenant.slug).await?;
        let key = keys::products_key(&tenant.slug);
        set_json(&*self.shared, &key, &products, Some(self.config.product_ttl)).await?;
        debug!(target = SOURCE, tenant = %tenant.slug, key, count = products.len(), "products refreshed");
        Ok(())
    }
}
