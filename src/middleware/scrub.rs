//! Beacon scrubbing middleware.
//!
//! [`scrub_middleware`] runs before the forwarding handler and matches
//! every request once, against one config snapshot that the handler then
//! reuses. For requests matching a route with `scrub: true` it buffers the
//! body, hands it to the [`BodyRewriter`] of that same snapshot, and swaps
//! the rewritten body in with a matching `Content-Length`. When rewriting fails the request is answered with
//! `500` and never reaches the upstream collector.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::TransformError;
use crate::proxy::headers::ensure_correlation_id;
use crate::proxy::RouteSnapshot;
use crate::rewrite::{BodyEncoding, BodyRewriter};
use crate::server::AppState;

/// Match the request, record the match as a [`RouteSnapshot`] extension,
/// and rewrite the body when the matched route asks for it.
pub async fn scrub_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let (snapshot, rewriter) = {
        let loaded = state.config.read().await;
        let config = Arc::clone(&loaded.config);
        (
            RouteSnapshot::new(config, req.uri().path(), req.method()),
            Arc::clone(&loaded.rewriter),
        )
    };
    let scrub = carries_body(req.method()) && snapshot.route().is_some_and(|r| r.scrub);
    let fallback = snapshot.config.scrub.default_encoding;
    req.extensions_mut().insert(snapshot);

    if !scrub {
        return next.run(req).await;
    }

    let correlation_id = ensure_correlation_id(req.headers_mut());
    let path = req.uri().path().to_string();

    match scrub_request(&rewriter, fallback, req).await {
        Ok(req) => {
            state.stats.scrubbed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(correlation_id = %correlation_id, path = %path, "beacon scrubbed");
            next.run(req).await
        }
        Err(e) => {
            state.stats.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                correlation_id = %correlation_id,
                path = %path,
                error = %e,
                "beacon rewrite failed, not forwarding"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Rewrite the body of `req` and fix up its framing headers.
///
/// The envelope is taken from `Content-Type`, falling back to
/// `fallback`. The body is read in full; the router's body limit bounds
/// how much that can be.
pub async fn scrub_request(
    rewriter: &BodyRewriter,
    fallback: BodyEncoding,
    req: Request,
) -> Result<Request, TransformError> {
    let (mut parts, body) = req.into_parts();

    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| TransformError::BodyRead {
            source: Box::new(e),
        })?;

    let content_type = parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let encoding = BodyEncoding::from_content_type(content_type, fallback);
    let rewritten = rewriter.rewrite(&bytes, encoding)?;

    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
    parts.headers.remove(TRANSFER_ENCODING);

    Ok(Request::from_parts(parts, Body::from(rewritten)))
}

fn carries_body(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::DELETE
    )
}
