//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the loaded
//! config snapshot, HTTP client, stats, and uptime), [`build_router`]
//! for constructing the Axum router with the scrub middleware and
//! tower-http layers, [`build_http_client`] for the connection-pooled
//! hyper client, and [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::model::Config;
use crate::config::ConfigVersion;
use crate::health::health_handler;
use crate::middleware::scrub::scrub_middleware;
use crate::proxy;
use crate::rewrite::BodyRewriter;

/// One config snapshot and the rewriter built from it.
///
/// Both are swapped together on reload. Requests take them under one read
/// (see [`proxy::RouteSnapshot`]), so a request never sees the key of one
/// snapshot with the routes of another.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Arc<Config>,
    pub rewriter: Arc<BodyRewriter>,
    pub version: ConfigVersion,
    pub source_name: String,
    pub loaded_at: Instant,
}

impl LoadedConfig {
    #[must_use]
    pub fn new(config: Config, version: ConfigVersion, source_name: impl Into<String>) -> Self {
        let rewriter = Arc::new(config.build_rewriter());
        Self {
            config: Arc::new(config),
            rewriter,
            version,
            source_name: source_name.into(),
            loaded_at: Instant::now(),
        }
    }

    /// Swap in a freshly loaded snapshot, keeping the source name.
    pub fn replace(&mut self, config: Config, version: ConfigVersion) {
        self.rewriter = Arc::new(config.build_rewriter());
        self.config = Arc::new(config);
        self.version = version;
        self.loaded_at = Instant::now();
    }
}

#[derive(Debug)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub scrubbed: AtomicU64,
    pub rejected: AtomicU64,
    pub config_reloads: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            scrubbed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            config_reloads: AtomicU64::new(0),
        }
    }
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub config: RwLock<LoadedConfig>,
    pub http_client: HttpClient,
    pub start_time: Instant,
    pub stats: Stats,
}

impl AppState {
    #[must_use]
    pub fn new(loaded: LoadedConfig) -> Self {
        Self {
            config: RwLock::new(loaded),
            http_client: build_http_client(),
            start_time: Instant::now(),
            stats: Stats::new(),
        }
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // With more than one rustls crypto provider compiled in, rustls cannot
    // pick one on its own. Install `ring` explicitly.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(proxy::forward_handler)
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            scrub_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
