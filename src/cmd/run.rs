//! `beacon-scrub run`: start the proxy server.
//!
//! Loads configuration from a file source (with an optional fallback
//! file), starts the Axum HTTP server with graceful shutdown, and spawns
//! a background config refresh loop for hot-reloading.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config::model::Config;
use crate::config::sources;
use crate::config::{ConfigResolver, ConfigSource};
use crate::error::BeaconScrubError;
use crate::logging;
use crate::server::{self, AppState, LoadedConfig};

const CONFIG_CANDIDATES: [&str; 4] = [
    "beacon-scrub.yaml",
    "beacon-scrub.yml",
    "beacon-scrub.json",
    "beacon-scrub.toml",
];

pub async fn execute(args: RunArgs) -> Result<(), BeaconScrubError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    #[cfg(feature = "sentry-integration")]
    let _sentry_guard = args
        .sentry_dsn
        .as_ref()
        .map(|dsn| crate::sentry_integration::init(dsn, args.sentry_environment.as_deref()));

    let resolver = resolve_config_sources(&args).await?;
    let (mut config, version) = resolver.load_with_fallback().await?;
    apply_cli_overrides(&mut config, args.timeout);

    let route_count = config.routes.len();
    let scrubbed_count = config.scrubbed_routes();
    let placeholders = config.scrub.placeholders;

    let loaded = LoadedConfig::new(config, version, resolver.primary_name());
    let state = Arc::new(AppState::new(loaded));

    // Dropping shutdown_tx closes the channel and stops the refresh loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let refresh_state = Arc::clone(&state);
    let refresh = RefreshSettings {
        interval_secs: args.poll_interval,
        timeout_override: args.timeout,
    };
    let refresh_handle = tokio::spawn(async move {
        config_refresh_loop(refresh_state, resolver, refresh, shutdown_rx).await;
    });

    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        routes = route_count,
        scrubbed_routes = scrubbed_count,
        placeholders = ?placeholders,
        "beacon-scrub started"
    );

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    if let Err(e) = refresh_handle.await {
        tracing::error!(error = %e, "config refresh task failed");
    }

    tracing::info!("beacon-scrub stopped");
    Ok(())
}

fn apply_cli_overrides(config: &mut Config, timeout: Option<u64>) {
    if let Some(timeout) = timeout {
        config.defaults.timeout = timeout;
    }
}

async fn resolve_config_sources(args: &RunArgs) -> Result<ConfigResolver, BeaconScrubError> {
    let Some(primary) = resolve_file_source(args.config.as_deref()).await? else {
        return Err(BeaconScrubError::NoConfigSource {
            hint: "Provide --config <file> or create ./beacon-scrub.yaml.\n  \
                   Run 'beacon-scrub init' to create a config file."
                .into(),
        });
    };

    let fallback = args
        .fallback_config
        .as_deref()
        .map(sources::for_path)
        .transpose()?;

    Ok(ConfigResolver::new(primary, fallback))
}

async fn resolve_file_source(
    explicit: Option<&Path>,
) -> Result<Option<Box<dyn ConfigSource>>, BeaconScrubError> {
    if let Some(path) = explicit {
        return sources::for_path(path).map(Some);
    }

    for name in &CONFIG_CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return sources::for_path(&path).map(Some);
        }
    }

    Ok(None)
}

struct RefreshSettings {
    interval_secs: u64,
    timeout_override: Option<u64>,
}

async fn config_refresh_loop(
    state: Arc<AppState>,
    resolver: ConfigResolver,
    settings: RefreshSettings,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(settings.interval_secs));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("config refresh loop shutting down");
                return;
            }
        }

        let current_version = state.config.read().await.version.clone();

        match resolver.reload_if_changed(&current_version).await {
            Ok(Some((mut config, version))) => {
                apply_cli_overrides(&mut config, settings.timeout_override);
                let route_count = config.routes.len();
                let short = version.short().to_string();
                state.config.write().await.replace(config, version);
                state.stats.config_reloads.fetch_add(1, Ordering::Relaxed);
                tracing::info!(routes = route_count, version = %short, "config reloaded");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "config reload failed, keeping current config");
            }
        }
    }
}
