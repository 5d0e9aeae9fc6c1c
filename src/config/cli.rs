use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the storefront binary.
#[derive(Debug, Parser)]
#[command(
    name = "storefront",
    version,
    about = "Multi-tenant storefront page resolver and cache refresher"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "STOREFRONT_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Resolve one page and print the result as JSON.
    Resolve(ResolveArgs),
    /// Run the cache refresh daemon.
    Refresh(RefreshArgs),
    /// Purge URLs from the CDN edge cache.
    Purge(PurgeArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    /// Tenant identifier.
    #[arg(long, value_name = "ID")]
    pub tenant: String,

    /// Requested path, e.g. `/` or `/products/lamp`.
    #[arg(long, value_name = "PATH", default_value = "/")]
    pub path: String,

    /// Preview mode: bypass the whole-result cache entirely.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub preview: bool,

    /// Skip reading and writing the whole-result cache.
    #[arg(long = "no-cache", action = clap::ArgAction::SetTrue)]
    pub no_cache: bool,
}

#[derive(Debug, Args, Clone, Default)]
pub struct RefreshArgs {
    /// Run a single tick and exit.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub once: bool,

    /// Override the delay between ticks.
    #[arg(long = "refresh-interval-seconds", value_name = "SECONDS")]
    pub interval_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct PurgeArgs {
    /// URLs to purge.
    #[arg(required = true, value_name = "URL", value_hint = ValueHint::Url)]
    pub urls: Vec<String>,
}

/// Overrides accepted by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the CMS base URL.
    #[arg(long = "origin-url", value_name = "URL", global = true, value_hint = ValueHint::Url)]
    pub origin_url: Option<String>,

    /// Override the precompiled artifact directory.
    #[arg(long = "artifact-dir", value_name = "PATH", global = true, value_hint = ValueHint::DirPath)]
    pub artifact_dir: Option<PathBuf>,

    /// Override the raw template corpus directory.
    #[arg(long = "corpus-dir", value_name = "PATH", global = true, value_hint = ValueHint::DirPath)]
    pub corpus_dir: Option<PathBuf>,
}
