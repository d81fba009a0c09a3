//! Core HTTP forwarding handler.
//!
//! The [`forward_handler`] function is the Axum fallback that receives
//! every non-`/health` request after the scrub middleware has matched it
//! and, where needed, rewritten its body. The match travels with the
//! request as a [`RouteSnapshot`] extension. Submodules handle route
//! matching ([`routing`]), header construction ([`headers`]), and the
//! upstream call ([`forward`]).

pub mod forward;
pub mod headers;
pub mod routing;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Extension;

use crate::config::model::{Config, Route};
use crate::server::AppState;

/// The config a request was matched against, and what it matched.
///
/// Taken once per request under a single read of the shared config, so
/// the scrub decision, the injected key and the upstream target all come
/// from the same snapshot even when a reload lands mid-request.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    pub config: Arc<Config>,
    pub matched: Option<(usize, HashMap<String, String>)>,
}

impl RouteSnapshot {
    #[must_use]
    pub fn new(config: Arc<Config>, path: &str, method: &Method) -> Self {
        let matched = routing::match_route(&config.routes, path, method.as_str());
        Self { config, matched }
    }

    #[must_use]
    pub fn route(&self) -> Option<&Route> {
        self.matched.as_ref().map(|(idx, _)| &self.config.routes[*idx])
    }
}

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(snapshot): Extension<RouteSnapshot>,
    method: Method,
    uri: Uri,
    mut req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path();
    let correlation_id = headers::ensure_correlation_id(&mut req_headers);

    let config = &snapshot.config;
    let Some((route_idx, params)) = &snapshot.matched else {
        tracing::warn!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            "no route matched"
        );
        return StatusCode::NOT_FOUND.into_response();
    };
    let route = &config.routes[*route_idx];

    tracing::debug!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        route = %route.path,
        bytes = body.len(),
        "forwarding request"
    );

    let client_ip = addr.ip().to_string();
    let request = forward::ForwardRequest {
        client: &state.http_client,
        route,
        defaults: &config.defaults,
        params,
        method: &method,
        uri: &uri,
        original_headers: &req_headers,
        body,
        client_ip: &client_ip,
        correlation_id: &correlation_id,
    };

    match forward::forward(request).await {
        Ok(upstream) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            let mut resp_headers = upstream.headers;
            headers::strip_response_hop_by_hop(&mut resp_headers);
            let mut builder = Response::builder().status(upstream.status);
            for (key, value) in &resp_headers {
                builder = builder.header(key, value);
            }
            builder
                .header(headers::CORRELATION_ID, &correlation_id)
                .body(axum::body::Body::from(upstream.body))
                .unwrap_or_else(|e| {
                    tracing::error!(
                        correlation_id = %correlation_id,
                        error = %e,
                        "failed to build response"
                    );
                    StatusCode::BAD_GATEWAY.into_response()
                })
        }
        Err(e) => {
            tracing::error!(
                correlation_id = %correlation_id,
                route = %route.path,
                error = %e,
                "upstream request failed"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
