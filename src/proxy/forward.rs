//! Forwarding a (possibly rewritten) beacon to its upstream collector.
//!
//! [`forward`] resolves the route's target template, builds the
//! upstream request with proxy headers, and waits for the complete
//! response under the route's timeout. Unlike the client-facing side,
//! nothing here looks at the body: by the time a request reaches the
//! forwarder the scrub middleware has already rewritten it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, Method, Uri};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::StatusCode;

use crate::config::model::{Defaults, Route};
use crate::error::BeaconScrubError;
use crate::server::HttpClient;

use super::headers::build_forwarded_headers;

#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub latency_ms: u64,
}

pub struct ForwardRequest<'a> {
    pub client: &'a HttpClient,
    pub route: &'a Route,
    pub defaults: &'a Defaults,
    pub params: &'a HashMap<String, String>,
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub original_headers: &'a HeaderMap,
    pub body: Bytes,
    pub client_ip: &'a str,
    pub correlation_id: &'a str,
}

#[allow(clippy::cast_possible_truncation)]
pub async fn forward(req: ForwardRequest<'_>) -> Result<UpstreamResponse, BeaconScrubError> {
    let resolved = resolve_target(&req.route.target, req.params, req.uri.query());
    let timeout_ms = req.route.timeout.unwrap_or(req.defaults.timeout);

    let parsed_url = url::Url::parse(&resolved).map_err(|e| BeaconScrubError::UriParse {
        source: Box::new(e),
    })?;

    let forwarded_headers = build_forwarded_headers(
        req.original_headers,
        req.client_ip,
        &parsed_url,
        req.route,
        req.defaults,
        req.correlation_id,
    );

    let mut builder = hyper::Request::builder()
        .method(req.method.clone())
        .uri(resolved.as_str());
    for (key, value) in &forwarded_headers {
        builder = builder.header(key, value);
    }
    let upstream_req = builder
        .body(Full::new(req.body))
        .map_err(|e| BeaconScrubError::HttpRequest {
            source: Box::new(e),
        })?;

    let start = Instant::now();
    let response = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        req.client.request(upstream_req),
    )
    .await
    .map_err(|_| BeaconScrubError::UpstreamTimeout {
        url: resolved.clone(),
        timeout_ms,
    })?
    .map_err(|e| BeaconScrubError::HttpRequest {
        source: Box::new(e),
    })?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| BeaconScrubError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();
    let latency_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        correlation_id = %req.correlation_id,
        target = %resolved,
        status = status.as_u16(),
        latency_ms,
        "upstream responded"
    );

    Ok(UpstreamResponse {
        status,
        headers,
        body,
        latency_ms,
    })
}

/// Fill `:param` placeholders and append the client's query string.
///
/// Params are substituted longest name first so `:endpoint_id` is not
/// clobbered by `:endpoint`.
fn resolve_target(
    template: &str,
    params: &HashMap<String, String>,
    query: Option<&str>,
) -> String {
    let mut result = template.to_string();
    let mut sorted_entries: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    sorted_entries.sort_by_key(|(k, _)| std::cmp::Reverse(k.len()));

    for (key, value) in sorted_entries {
        result = result.replace(&format!(":{key}"), value);
    }

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        result.push(if result.contains('?') { '&' } else { '?' });
        result.push_str(query);
    }
    result
}
