use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{
        refresh::{METRIC_REFRESH_FAILED, METRIC_REFRESH_SWEEP_MS},
        resolver::{METRIC_RESOLVE_CACHE_HIT, METRIC_RESOLVE_CACHE_MISS, METRIC_RESOLVE_MS},
    },
    cache::{METRIC_BACKFILL_FAILED, METRIC_MEMORY_EVICT, METRIC_MISS, METRIC_TIER_HIT},
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_TIER_HIT,
            Unit::Count,
            "Template snapshot lookups answered, labelled by the tier that answered."
        );
        describe_counter!(
            METRIC_MISS,
            Unit::Count,
            "Template snapshot lookups that found no record in any tier."
        );
        describe_counter!(
            METRIC_BACKFILL_FAILED,
            Unit::Count,
            "Background snapshot backfills that failed, labelled by target tier."
        );
        describe_counter!(
            METRIC_MEMORY_EVICT,
            Unit::Count,
            "In-process cache evictions due to capacity."
        );
        describe_counter!(
            METRIC_RESOLVE_CACHE_HIT,
            Unit::Count,
            "Page resolutions served from the whole-result cache."
        );
        describe_counter!(
            METRIC_RESOLVE_CACHE_MISS,
            Unit::Count,
            "Page resolutions that missed the whole-result cache."
        );
        describe_histogram!(
            METRIC_RESOLVE_MS,
            Unit::Milliseconds,
            "Latency of uncached page resolutions in milliseconds."
        );
        describe_counter!(
            METRIC_REFRESH_FAILED,
            Unit::Count,
            "Refresh daemon failures, labelled by sweep."
        );
        describe_histogram!(
            METRIC_REFRESH_SWEEP_MS,
            Unit::Milliseconds,
            "Refresh sweep duration in milliseconds, labelled by sweep."
        );
    });
}
