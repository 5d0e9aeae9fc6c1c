//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, GlobalOverrides, PurgeArgs, RefreshArgs, ResolveArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "storefront";
const ENV_PREFIX: &str = "STOREFRONT";
const DEFAULT_ORIGIN_URL: &str = "http://localhost:4000";
const DEFAULT_ORIGIN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MEMORY_CAPACITY: usize = 500;
const DEFAULT_MEMORY_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SHARED_TTL_SECS: u64 = 6 * 60 * 60;
const DEFAULT_MERGED_TTL_SECS: u64 = 5 * 60;
const DEFAULT_BLOCK_TTL_SECS: u64 = 60 * 60;
const DEFAULT_ARTIFACT_DIR: &str = "artifacts/templates";
const DEFAULT_CORPUS_DIR: &str = "templates";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
const DEFAULT_TEMPLATE_REFRESH_TTL_SECS: u64 = 30 * 60;
const DEFAULT_PRODUCT_TTL_SECS: u64 = 2 * 60;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub origin: OriginSettings,
    pub cache: CacheSettings,
    pub refresh: RefreshSettings,
    pub cdn: CdnSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct OriginSettings {
    pub url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Connection to the cross-instance key-value store.
#[derive(Debug, Clone)]
pub struct SharedStoreSettings {
    pub url: Url,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub memory_capacity: NonZeroUsize,
    pub memory_ttl: Duration,
    /// `None` keeps the shared tier in-process.
    pub shared: Option<SharedStoreSettings>,
    pub shared_ttl: Duration,
    pub artifact_dir: PathBuf,
    pub corpus_dir: PathBuf,
    pub merged_ttl: Duration,
    pub block_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub template_ttl: Duration,
    pub product_ttl: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CdnSettings {
    pub purge_url: Option<Url>,
    pub token: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_global_overrides(&cli.overrides);
    if let Some(Command::Refresh(args)) = cli.command.as_ref() {
        raw.apply_refresh_overrides(args);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    origin: RawOriginSettings,
    cache: RawCacheSettings,
    refresh: RawRefreshSettings,
    cdn: RawCdnSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.origin_url.as_ref() {
            self.origin.url = Some(url.clone());
        }
        if let Some(dir) = overrides.artifact_dir.as_ref() {
            self.cache.artifact_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.corpus_dir.as_ref() {
            self.cache.corpus_dir = Some(dir.clone());
        }
    }

    fn apply_refresh_overrides(&mut self, args: &RefreshArgs) {
        if let Some(seconds) = args.interval_seconds {
            self.refresh.interval_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            origin,
            cache,
            refresh,
            cdn,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            origin: build_origin_settings(origin)?,
            cache: build_cache_settings(cache)?,
            refresh: build_refresh_settings(refresh)?,
            cdn: build_cdn_settings(cdn)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_origin_settings(origin: RawOriginSettings) -> Result<OriginSettings, LoadError> {
    let url = origin.url.unwrap_or_else(|| DEFAULT_ORIGIN_URL.to_string());
    let url = parse_url(&url, "origin.url")?;
    let timeout = positive_secs(
        origin.timeout_seconds.unwrap_or(DEFAULT_ORIGIN_TIMEOUT_SECS),
        "origin.timeout_seconds",
    )?;

    Ok(OriginSettings {
        url,
        token: non_blank(origin.token),
        timeout,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let memory_capacity =
        NonZeroUsize::new(cache.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY)).ok_or_else(
            || LoadError::invalid("cache.memory_capacity", "must be greater than zero"),
        )?;

    let shared = match (non_blank(cache.shared_url), non_blank(cache.shared_token)) {
        (Some(url), Some(token)) => Some(SharedStoreSettings {
            url: parse_url(&url, "cache.shared_url")?,
            token,
        }),
        (Some(_), None) => {
            return Err(LoadError::invalid(
                "cache.shared_token",
                "required when cache.shared_url is set",
            ));
        }
        (None, _) => None,
    };

    let artifact_dir = cache
        .artifact_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR));
    if artifact_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "cache.artifact_dir",
            "path must not be empty",
        ));
    }

    let corpus_dir = cache
        .corpus_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CORPUS_DIR));
    if corpus_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid("cache.corpus_dir", "path must not be empty"));
    }

    Ok(CacheSettings {
        memory_capacity,
        memory_ttl: positive_secs(
            cache.memory_ttl_seconds.unwrap_or(DEFAULT_MEMORY_TTL_SECS),
            "cache.memory_ttl_seconds",
        )?,
        shared,
        shared_ttl: positive_secs(
            cache.shared_ttl_seconds.unwrap_or(DEFAULT_SHARED_TTL_SECS),
            "cache.shared_ttl_seconds",
        )?,
        artifact_dir,
        corpus_dir,
        merged_ttl: positive_secs(
            cache.merged_ttl_seconds.unwrap_or(DEFAULT_MERGED_TTL_SECS),
            "cache.merged_ttl_seconds",
        )?,
        block_ttl: positive_secs(
            cache.block_ttl_seconds.unwrap_or(DEFAULT_BLOCK_TTL_SECS),
            "cache.block_ttl_seconds",
        )?,
    })
}

fn build_refresh_settings(refresh: RawRefreshSettings) -> Result<RefreshSettings, LoadError> {
    Ok(RefreshSettings {
        interval: positive_secs(
            refresh
                .interval_seconds
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
            "refresh.interval_seconds",
        )?,
        template_ttl: positive_secs(
            refresh
                .template_ttl_seconds
                .unwrap_or(DEFAULT_TEMPLATE_REFRESH_TTL_SECS),
            "refresh.template_ttl_seconds",
        )?,
        product_ttl: positive_secs(
            refresh
                .product_ttl_seconds
                .unwrap_or(DEFAULT_PRODUCT_TTL_SECS),
            "refresh.product_ttl_seconds",
        )?,
    })
}

fn build_cdn_settings(cdn: RawCdnSettings) -> Result<CdnSettings, LoadError> {
    let purge_url = non_blank(cdn.purge_url)
        .map(|url| parse_url(&url, "cdn.purge_url"))
        .transpose()?;
    Ok(CdnSettings {
        purge_url,
        token: non_blank(cdn.token),
    })
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "URL scheme must be http or https"));
    }
    Ok(url)
}

fn positive_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    url: Option<String>,
    token: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    memory_capacity: Option<usize>,
    memory_ttl_seconds: Option<u64>,
    shared_url: Option<String>,
    shared_token: Option<String>,
    shared_ttl_seconds: Option<u64>,
    artifact_dir: Option<PathBuf>,
    corpus_dir: Option<PathBuf>,
    merged_ttl_seconds: Option<u64>,
    block_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRefreshSettings {
    interval_seconds: Option<u64>,
    template_ttl_seconds: Option<u64>,
    product_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCdnSettings {
    purge_url: Option<String>,
    token: Option<String>,
}
