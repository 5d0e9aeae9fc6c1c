use std::{process, sync::Arc};

use storefront::{
    application::{
        error::{AppError, ErrorReport},
        origin::Origin,
        refresh::{CacheRefreshDaemon, RefreshConfig},
        registry::RendererRegistry,
        resolver::{PageResolver, ResolveOptions},
    },
    cache::{ArtifactTier, CacheConfig, CacheTier, FsCorpus, LocalKvTier, SnapshotStore},
    config,
    infra::{
        cdn::CdnPurger, error::InfraError, http_origin::HttpOrigin, telemetry,
        upstash::UpstashTier,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(i32::from(error.exit_code()));
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("storefront", error);
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Refresh(config::RefreshArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Resolve(args) => run_resolve(settings, args).await,
        config::Command::Refresh(args) => run_refresh(settings, args).await,
        config::Command::Purge(args) => run_purge(settings, args).await,
    }
}

/// Collaborators shared by every command.
struct Services {
    origin: Arc<dyn Origin>,
    shared: Arc<dyn CacheTier>,
    snapshots: Arc<SnapshotStore>,
}

fn build_services(settings: &config::Settings) -> Result<Services, AppError> {
    let origin: Arc<dyn Origin> = Arc::new(HttpOrigin::new(&settings.origin)?);

    let shared: Arc<dyn CacheTier> = match &settings.cache.shared {
        Some(store) => Arc::new(UpstashTier::new(
            store.url.clone(),
            store.token.clone(),
            settings.origin.timeout,
        )?),
        None => {
            info!("no shared cache configured; using an in-process store");
            Arc::new(LocalKvTier::new())
        }
    };

    let snapshots = Arc::new(SnapshotStore::new(
        CacheConfig::from(&settings.cache),
        Arc::clone(&shared),
        Arc::new(ArtifactTier::new(settings.cache.artifact_dir.clone())),
        Arc::new(FsCorpus::new(settings.cache.corpus_dir.clone())),
    ));

    Ok(Services {
        origin,
        shared,
        snapshots,
    })
}

async fn run_resolve(
    settings: config::Settings,
    args: config::ResolveArgs,
) -> Result<(), AppError> {
    let services = build_services(&settings)?;
    let resolver = PageResolver::new(
        services.origin,
        services.snapshots,
        Arc::new(RendererRegistry::new()),
        services.shared,
    );

    let options = ResolveOptions {
        use_cache: !args.no_cache,
        preview: args.preview,
    };
    let resolved = resolver.resolve(&args.tenant, &args.path, options).await?;
    info!(
        tenant = %resolved.tenant.slug,
        path = %args.path,
        cache_hit = resolved.cache_hit,
        page_hash = %resolved.fingerprint,
        "page resolved"
    );

    let output = serde_json::to_string_pretty(&resolved)
        .map_err(|err| AppError::unexpected(format!("failed to encode result: {err}")))?;
    println!("{output}");
    Ok(())
}

async fn run_refresh(
    settings: config::Settings,
    args: config::RefreshArgs,
) -> Result<(), AppError> {
    let services = build_services(&settings)?;
    let daemon = Arc::new(CacheRefreshDaemon::new(
        services.origin,
        services.shared,
        RefreshConfig::from(&settings.refresh),
    ));

    if args.once {
        let report = daemon.tick().await;
        info!(
            templates_refreshed = report.templates.refreshed,
            templates_failed = report.templates.failed,
            products_refreshed = report.products.refreshed,
            products_failed = report.products.failed,
            "refresh tick completed"
        );
        return Ok(());
    }

    let handle = Arc::clone(&daemon).spawn();
    tokio::select! {
        result = handle => {
            result.map_err(|err| AppError::unexpected(format!("refresh daemon stopped: {err}")))
        }
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| {
                AppError::unexpected(format!("failed to listen for shutdown signal: {err}"))
            })?;
            info!("shutdown signal received; stopping refresh daemon");
            Ok(())
        }
    }
}

async fn run_purge(settings: config::Settings, args: config::PurgeArgs) -> Result<(), AppError> {
    let purger = CdnPurger::new(&settings.cdn, settings.origin.timeout)?;
    purger.purge(&args.urls).await?;
    Ok(())
}
