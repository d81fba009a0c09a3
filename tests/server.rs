//! Integration tests for the HTTP server: health endpoint, end-to-end
//! beacon scrubbing against a local upstream, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Uri};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use serde_json::Value;
use tokio::sync::Mutex;

use beacon_scrub::config::model::{Config, Defaults, HeaderRules, Route, ScrubSettings};
use beacon_scrub::config::ConfigVersion;
use beacon_scrub::health::HealthResponse;
use beacon_scrub::middleware::scrub::scrub_middleware;
use beacon_scrub::proxy::forward_handler;
use beacon_scrub::rewrite::clear_list::DEFAULT_SENTINEL;
use beacon_scrub::rewrite::Placeholders;
use beacon_scrub::server::{self, AppState, LoadedConfig};

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

type CaptureLog = Arc<Mutex<Vec<Captured>>>;

async fn capture(
    State(log): State<CaptureLog>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> &'static str {
    log.lock().await.push(Captured {
        path: uri.to_string(),
        headers,
        body,
    });
    "1"
}

/// Local stand-in for the ingestion API; answers `1` like the real one.
async fn start_upstream() -> (SocketAddr, CaptureLog) {
    let log = CaptureLog::default();
    let app = axum::Router::new()
        .fallback(capture)
        .with_state(Arc::clone(&log));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, log)
}

fn route(path: &str, target: String, scrub: bool) -> Route {
    Route {
        path: path.into(),
        methods: vec!["POST".into()],
        target,
        scrub,
        timeout: None,
        headers: HeaderRules::default(),
    }
}

fn test_config(upstream: SocketAddr) -> Config {
    Config {
        mixpanel_key: "ABC".into(),
        scrub: ScrubSettings {
            placeholders: Placeholders::Sentinel,
            ..ScrubSettings::default()
        },
        defaults: Defaults::default(),
        routes: vec![
            route("/track", format!("http://{upstream}/track"), true),
            route("/decide", format!("http://{upstream}/decide"), false),
            // Nothing listens on port 9; connections are refused.
            route("/engage", "http://127.0.0.1:9/engage".into(), true),
        ],
    }
}

async fn start_test_server(config: Config) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let loaded = LoadedConfig::new(config, ConfigVersion::Hash("test-hash".into()), "test");
    let state = Arc::new(AppState::new(loaded));

    let router = server::build_router(state, 1_048_576);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}

async fn health(addr: SocketAddr) -> HealthResponse {
    reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

fn declared_length(headers: &HeaderMap) -> usize {
    headers["content-length"].to_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn health_endpoint_returns_healthy() {
    let (upstream, _) = start_upstream().await;
    let (addr, shutdown) = start_test_server(test_config(upstream)).await;

    let health = health(addr).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.config.source, "test");
    assert_eq!(health.config.version, "test-has");
    assert_eq!(health.config.routes, 3);
    assert_eq!(health.config.scrubbed_routes, 2);
    assert_eq!(health.config.placeholders, Placeholders::Sentinel);
    assert_eq!(health.stats.requests_forwarded, 0);
    assert_eq!(health.stats.requests_scrubbed, 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn health_never_exposes_key() {
    let (upstream, _) = start_upstream().await;
    let (addr, shutdown) = start_test_server(test_config(upstream)).await;

    let body = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!body.contains("ABC"));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unmatched_route_returns_404() {
    let (upstream, log) = start_upstream().await;
    let (addr, shutdown) = start_test_server(test_config(upstream)).await;

    let resp = reqwest::get(format!("http://{addr}/nonexistent"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert!(log.lock().await.is_empty());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn json_beacon_is_scrubbed_before_forwarding() {
    let (upstream, log) = start_upstream().await;
    let (addr, shutdown) = start_test_server(test_config(upstream)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/track?verbose=1"))
        .header("content-type", "application/json")
        .body(
            r#"[{"event":"Page View","properties":{"$referrer":"https://secret.example/a","distinct_id":"u1"}}]"#,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "1");

    let captured = log.lock().await.clone();
    assert_eq!(captured.len(), 1);
    let beacon = &captured[0];
    assert_eq!(beacon.path, "/track?verbose=1");
    assert_eq!(declared_length(&beacon.headers), beacon.body.len());

    let events: Value = serde_json::from_slice(&beacon.body).unwrap();
    let props = &events[0]["properties"];
    assert_eq!(props["token"], "ABC");
    assert_eq!(props["$referrer"], DEFAULT_SENTINEL);
    assert_eq!(props["$referring_domain"], DEFAULT_SENTINEL);
    assert_eq!(props["$current_url"], DEFAULT_SENTINEL);
    assert_eq!(props["distinct_id"], "u1");
    assert_eq!(events[0]["event"], "Page View");

    let health = health(addr).await;
    assert_eq!(health.stats.requests_scrubbed, 1);
    assert_eq!(health.stats.requests_forwarded, 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn form_beacon_keeps_envelope_and_other_fields() {
    let (upstream, log) = start_upstream().await;
    let (addr, shutdown) = start_test_server(test_config(upstream)).await;

    let events = r#"[{"event":"e1","properties":{"$current_url":"https://secret.example/x"}},{"event":"e2","properties":{}}]"#;
    let body: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("data", events)
        .append_pair("ip", "1")
        .finish();

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/track"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let captured = log.lock().await.clone();
    assert_eq!(captured.len(), 1);
    let beacon = &captured[0];
    assert_eq!(declared_length(&beacon.headers), beacon.body.len());

    let fields: Vec<(String, String)> = url::form_urlencoded::parse(&beacon.body)
        .into_owned()
        .collect();
    assert_eq!(fields[0].0, "data");
    assert!(fields.contains(&("ip".into(), "1".into())));

    let forwarded: Value = serde_json::from_str(&fields[0].1).unwrap();
    for event in forwarded.as_array().unwrap() {
        assert_eq!(event["properties"]["token"], "ABC");
        assert_eq!(event["properties"]["$current_url"], DEFAULT_SENTINEL);
    }
    assert_eq!(forwarded[1]["event"], "e2");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn malformed_beacon_rejected_without_forwarding() {
    let (upstream, log) = start_upstream().await;
    let (addr, shutdown) = start_test_server(test_config(upstream)).await;

    let client = reqwest::Client::new();
    for (content_type, body) in [
        ("application/json", "notjson"),
        ("application/json", "{}"),
        ("application/x-www-form-urlencoded", "ip=1"),
    ] {
        let resp = client
            .post(format!("http://{addr}/track"))
            .header("content-type", content_type)
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500, "{body}");
    }

    assert!(log.lock().await.is_empty());
    let health = health(addr).await;
    assert_eq!(health.stats.requests_rejected, 3);
    assert_eq!(health.stats.requests_forwarded, 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn pass_through_route_forwards_body_untouched() {
    let (upstream, log) = start_upstream().await;
    let (addr, shutdown) = start_test_server(test_config(upstream)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/decide"))
        .header("content-type", "application/json")
        .body("notjson")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let captured = log.lock().await.clone();
    assert_eq!(captured.len(), 1);
    assert_eq!(&captured[0].body[..], b"notjson");

    let health = health(addr).await;
    assert_eq!(health.stats.requests_scrubbed, 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unreachable_upstream_returns_502() {
    let (upstream, _) = start_upstream().await;
    let (addr, shutdown) = start_test_server(test_config(upstream)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/engage"))
        .header("content-type", "application/json")
        .body(r#"[{"properties":{}}]"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);

    let health = health(addr).await;
    assert_eq!(health.stats.requests_scrubbed, 1);
    assert_eq!(health.stats.requests_failed, 1);

    let _ = shutdown.send(());
}

/// Installs `next_config` between the scrub middleware and the handler,
/// the way a reload landing mid-request would.
async fn reload_mid_request(
    State((state, next_config)): State<(Arc<AppState>, Config)>,
    req: Request,
    next: Next,
) -> Response {
    state
        .config
        .write()
        .await
        .replace(next_config, ConfigVersion::Hash("reloaded".into()));
    next.run(req).await
}

#[tokio::test]
async fn reload_mid_request_keeps_one_snapshot() {
    let (old_upstream, old_log) = start_upstream().await;
    let (new_upstream, new_log) = start_upstream().await;

    let mut old = test_config(old_upstream);
    old.mixpanel_key = "OLD".into();
    let mut new = test_config(new_upstream);
    new.mixpanel_key = "NEW".into();

    let loaded = LoadedConfig::new(old, ConfigVersion::Hash("initial".into()), "test");
    let state = Arc::new(AppState::new(loaded));
    let router = axum::Router::new()
        .fallback(forward_handler)
        .layer(from_fn_with_state((Arc::clone(&state), new), reload_mid_request))
        .layer(from_fn_with_state(Arc::clone(&state), scrub_middleware))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/track"))
        .header("content-type", "application/json")
        .body(r#"[{"properties":{}}]"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let captured = old_log.lock().await.clone();
    assert_eq!(captured.len(), 1);
    let events: Value = serde_json::from_slice(&captured[0].body).unwrap();
    assert_eq!(events[0]["properties"]["token"], "OLD");
    assert!(new_log.lock().await.is_empty());

    // the reload itself did land
    assert_eq!(state.config.read().await.config.mixpanel_key, "NEW");
}

#[tokio::test]
async fn graceful_shutdown_works() {
    let (upstream, _) = start_upstream().await;
    let (addr, shutdown) = start_test_server(test_config(upstream)).await;

    let url = format!("http://{addr}/health");
    assert!(reqwest::get(&url).await.is_ok());

    let _ = shutdown.send(());

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let result = reqwest::get(&url).await;
    assert!(result.is_err());
}
