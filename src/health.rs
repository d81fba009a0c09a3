//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, uptime, config source metadata, route counts, the active
//! placeholder policy, and cumulative request statistics. The API key
//! is never part of the payload.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::rewrite::Placeholders;
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    pub loaded_ago_seconds: u64,
    pub routes: usize,
    pub scrubbed_routes: usize,
    pub placeholders: Placeholders,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_scrubbed: u64,
    pub requests_rejected: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (config, source_name, version_str, loaded_ago) = {
        let loaded = state.config.read().await;
        (
            Arc::clone(&loaded.config),
            loaded.source_name.clone(),
            loaded.version.short().to_string(),
            loaded.loaded_at.elapsed().as_secs(),
        )
    };

    let stats = &state.stats;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: source_name,
            version: version_str,
            loaded_ago_seconds: loaded_ago,
            routes: config.routes.len(),
            scrubbed_routes: config.scrubbed_routes(),
            placeholders: config.scrub.placeholders,
        },
        stats: StatsResponse {
            requests_forwarded: stats.forwarded.load(Ordering::Relaxed),
            requests_failed: stats.failed.load(Ordering::Relaxed),
            requests_scrubbed: stats.scrubbed.load(Ordering::Relaxed),
            requests_rejected: stats.rejected.load(Ordering::Relaxed),
        },
    })
}
