//! Request and response headers on the way through the proxy.
//!
//! Upstream requests get the client's headers (unless
//! `defaults.forward_headers` is off) minus hop-by-hop ones, a `Host`
//! naming the target, the proxy trail (`X-Forwarded-*`, `X-Real-IP`,
//! `Via`, the correlation id) and finally the configured add/strip rules,
//! defaults first and route second. `Content-Length` passes through
//! untouched: the scrub middleware has already set it for the rewritten
//! body.

use axum::http::header::{
    CONNECTION, CONTENT_LENGTH, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER,
    TRANSFER_ENCODING, UPGRADE, VIA,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::model::{Defaults, HeaderRules, Route};

pub const CORRELATION_ID: &str = "x-correlation-id";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_REAL_IP: &str = "x-real-ip";

const VIA_VALUE: &str = concat!("1.1 ", env!("CARGO_PKG_NAME"));

/// Return the request's correlation id, generating and inserting one if absent.
pub fn ensure_correlation_id(headers: &mut HeaderMap) -> String {
    let existing = headers
        .get(CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    if let Some(id) = existing {
        return id.to_string();
    }

    let id = uuid::Uuid::new_v4().to_string();
    set(headers, CORRELATION_ID, &id);
    id
}

/// Prepare upstream response headers for relaying to the client.
///
/// The forwarder has already collected the whole body, so the origin's
/// framing headers no longer apply; axum sets `Content-Length` again.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    remove_hop_by_hop(headers);
    headers.remove(CONTENT_LENGTH);
}

/// Headers for the upstream request to `target`.
pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: &str,
    target: &Url,
    route: &Route,
    defaults: &Defaults,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = if defaults.forward_headers {
        original.clone()
    } else {
        HeaderMap::new()
    };
    if defaults.strip_hop_by_hop {
        remove_hop_by_hop(&mut headers);
    }

    if let Some(host) = target.host_str() {
        match target.port() {
            Some(port) => set(&mut headers, HOST, &format!("{host}:{port}")),
            None => set(&mut headers, HOST, host),
        }
    }

    if defaults.proxy_headers {
        add_proxy_trail(&mut headers, original, client_ip, target, correlation_id);
    }

    let rules = [("defaults", &defaults.headers), ("route", &route.headers)];
    for (scope, rules) in rules {
        add_configured(&mut headers, scope, rules);
    }
    for (_, rules) in rules {
        for name in &rules.strip {
            headers.remove(name.as_str());
        }
    }

    headers
}

fn add_proxy_trail(
    headers: &mut HeaderMap,
    original: &HeaderMap,
    client_ip: &str,
    target: &Url,
    correlation_id: &str,
) {
    let chain = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(earlier) => format!("{earlier}, {client_ip}"),
        None => client_ip.to_string(),
    };
    let origin = chain.split(',').next().map_or(client_ip, str::trim);
    set(headers, X_REAL_IP, origin);
    set(headers, X_FORWARDED_FOR, &chain);

    let proto = if target.scheme() == "https" { "https" } else { "http" };
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(proto));
    if let Some(host) = original.get(HOST) {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
    headers.insert(VIA, HeaderValue::from_static(VIA_VALUE));
    set(headers, CORRELATION_ID, correlation_id);
}

fn add_configured(headers: &mut HeaderMap, scope: &str, rules: &HeaderRules) {
    for (name, value) in &rules.add {
        let Ok(name) = name.parse::<HeaderName>() else {
            tracing::warn!(scope, header = %name, "invalid header name in headers.add, skipping");
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            tracing::warn!(scope, header = %name, "invalid header value in headers.add, skipping");
            continue;
        };
        headers.insert(name, value);
    }
}

fn remove_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        CONNECTION,
        TRANSFER_ENCODING,
        TE,
        TRAILER,
        UPGRADE,
        PROXY_AUTHORIZATION,
        PROXY_AUTHENTICATE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Insert `value` under `name`, silently skipping values that are not
/// valid header text.
fn set<K>(headers: &mut HeaderMap, name: K, value: &str)
where
    K: axum::http::header::IntoHeaderName,
{
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
