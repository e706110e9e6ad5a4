//! End-to-end tests for the forwarding pipeline: a real upstream and a
//! real proxy instance on ephemeral ports, driven with reqwest.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use authgate::metrics::ProxyMetrics;
use authgate::proxy::notify::Notifier;
use authgate::proxy::resolver::BaseUrlResolver;
use authgate::proxy::rewrite::BodyRewrite;
use authgate::server::{self, AppState};

const UPSTREAM_BODY: &str = "hello $your_template_variable world";

/// Fake dashboard backend. Counts hits, echoes the proxy-injected
/// headers back as `x-seen-*` response headers, sleeps on `/slow`
/// paths, and echoes POST bodies verbatim.
async fn upstream_handler(State(hits): State<Arc<AtomicUsize>>, req: Request) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);

    if req.uri().path().starts_with("/slow") {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let mut builder = Response::builder()
        .status(200)
        .header("content-type", "text/plain");

    for (name, echo) in [
        ("x-webauth-user", "x-seen-user"),
        ("x-forwarded-for", "x-seen-xff"),
        ("x-custom", "x-seen-custom"),
        ("host", "x-seen-host"),
    ] {
        if let Some(value) = req.headers().get(name) {
            builder = builder.header(echo, value.clone());
        }
    }
    if let Some(query) = req.uri().query() {
        builder = builder.header("x-seen-query", query);
    }

    if req.method() == axum::http::Method::POST {
        let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
            .await
            .unwrap();
        return builder.body(Body::from(bytes)).unwrap();
    }

    builder.body(Body::from(UPSTREAM_BODY)).unwrap()
}

async fn start_upstream() -> (SocketAddr, Arc<AtomicUsize>, tokio::sync::oneshot::Sender<()>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .fallback(upstream_handler)
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    (addr, hits, shutdown_tx)
}

fn single_host_state(upstream: SocketAddr) -> AppState {
    AppState {
        http_client: server::build_http_client(),
        resolver: BaseUrlResolver::SingleHost {
            base_url: format!("http://{upstream}"),
            username: "admin".into(),
        },
        notifiers: vec![Notifier::Log],
        rewrite: BodyRewrite::new("$your_template_variable", "goes_in_here"),
        timeout: Duration::from_secs(5),
        read_only: true,
        metrics: None,
    }
}

async fn start_proxy(state: AppState) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let router = server::build_router(Arc::new(state));

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

#[tokio::test]
async fn body_marker_is_rewritten_and_length_recomputed() {
    let (upstream, _hits, _u) = start_upstream().await;
    let (proxy, _p) = start_proxy(single_host_state(upstream)).await;

    let resp = reqwest::get(format!("http://{proxy}/dashboards"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/plain"
    );
    assert_eq!(resp.headers().get("content-length").unwrap(), "24");
    assert_eq!(resp.text().await.unwrap(), "hello goes_in_here world");
}

#[tokio::test]
async fn exactly_one_upstream_call_per_request() {
    let (upstream, hits, _u) = start_upstream().await;
    let (proxy, _p) = start_proxy(single_host_state(upstream)).await;

    reqwest::get(format!("http://{proxy}/d/abc")).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn marker_free_body_passes_through_byte_for_byte() {
    let (upstream, _hits, _u) = start_upstream().await;
    let mut state = single_host_state(upstream);
    state.rewrite = BodyRewrite::new("not-present-anywhere", "x");
    let (proxy, _p) = start_proxy(state).await;

    let resp = reqwest::get(format!("http://{proxy}/dashboards"))
        .await
        .unwrap();

    assert_eq!(
        resp.headers().get("content-length").unwrap(),
        &UPSTREAM_BODY.len().to_string()
    );
    assert_eq!(resp.text().await.unwrap(), UPSTREAM_BODY);
}

#[tokio::test]
async fn identity_and_forwarded_for_are_proxy_authoritative() {
    let (upstream, _hits, _u) = start_upstream().await;
    let (proxy, _p) = start_proxy(single_host_state(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{proxy}/profile"))
        .header("x-webauth-user", "mallory")
        .header("x-forwarded-for", "1.2.3.4")
        .header("x-custom", "kept")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.headers().get("x-seen-user").unwrap(), "admin");
    // The spoofed chain is discarded; the proxy reports the socket peer.
    let xff = resp.headers().get("x-seen-xff").unwrap().to_str().unwrap();
    assert!(xff.starts_with("127.0.0.1:"), "got {xff}");
    // Unrelated client headers are carried over.
    assert_eq!(resp.headers().get("x-seen-custom").unwrap(), "kept");
    // Host names the upstream, not the proxy.
    assert_eq!(
        resp.headers().get("x-seen-host").unwrap(),
        &format!("{upstream}")
    );
}

#[tokio::test]
async fn query_string_is_appended_verbatim() {
    let (upstream, _hits, _u) = start_upstream().await;
    let (proxy, _p) = start_proxy(single_host_state(upstream)).await;

    let resp = reqwest::get(format!("http://{proxy}/search?q=a%20b&limit=1"))
        .await
        .unwrap();

    assert_eq!(
        resp.headers().get("x-seen-query").unwrap(),
        "q=a%20b&limit=1"
    );
}

#[tokio::test]
async fn deadline_expiry_yields_clean_502() {
    let (upstream, _hits, _u) = start_upstream().await;
    let mut state = single_host_state(upstream);
    state.timeout = Duration::from_millis(100);
    let (proxy, _p) = start_proxy(state).await;

    let resp = reqwest::get(format!("http://{proxy}/slow")).await.unwrap();

    assert_eq!(resp.status(), 502);
    assert!(resp.bytes().await.unwrap().is_empty());
}

/// Upstream that promises 100 body bytes but closes the socket after
/// seven, so the proxy's body buffering fails mid-read.
async fn start_truncating_upstream() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
                    .await;
            });
        }
    });

    addr
}

#[tokio::test]
async fn truncated_upstream_body_yields_clean_500() {
    let upstream = start_truncating_upstream().await;
    let (proxy, _p) = start_proxy(single_host_state(upstream)).await;

    let resp = reqwest::get(format!("http://{proxy}/dashboards"))
        .await
        .unwrap();

    // Nothing was written to the client before the read failed, so the
    // local error maps to a clean 500 with an empty body.
    assert_eq!(resp.status(), 500);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_upstream_yields_502() {
    let (upstream, _hits, _u) = start_upstream().await;
    let mut state = single_host_state(upstream);
    state.resolver = BaseUrlResolver::SingleHost {
        base_url: "http://127.0.0.1:1".into(),
        username: "admin".into(),
    };
    let (proxy, _p) = start_proxy(state).await;

    let resp = reqwest::get(format!("http://{proxy}/anything")).await.unwrap();

    assert_eq!(resp.status(), 502);
}

#[tokio::test]
async fn read_only_mode_rejects_writes_without_calling_upstream() {
    let (upstream, hits, _u) = start_upstream().await;
    let (proxy, _p) = start_proxy(single_host_state(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client
        .delete(format!("http://{proxy}/api/dashboards/db/test"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 405);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn read_only_mode_still_allows_tsdb_queries() {
    let (upstream, hits, _u) = start_upstream().await;
    let (proxy, _p) = start_proxy(single_host_state(upstream)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{proxy}/api/tsdb/query"))
        .body("{\"queries\":[]}")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(resp.text().await.unwrap(), "{\"queries\":[]}");
}

#[tokio::test]
async fn post_bodies_stream_through_when_writable() {
    let (upstream, _hits, _u) = start_upstream().await;
    let mut state = single_host_state(upstream);
    state.read_only = false;
    let (proxy, _p) = start_proxy(state).await;

    let payload = "x".repeat(64 * 1024);
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{proxy}/api/annotations"))
        .body(payload.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), payload);
}

#[tokio::test]
async fn logout_redirects_to_root() {
    let (upstream, hits, _u) = start_upstream().await;
    let (proxy, _p) = start_proxy(single_host_state(upstream)).await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let resp = client
        .get(format!("http://{proxy}/logout"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 301);
    assert_eq!(resp.headers().get("location").unwrap(), "/");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn metrics_exposition_reflects_forwarded_requests() {
    let (upstream, _hits, _u) = start_upstream().await;
    let metrics = Arc::new(ProxyMetrics::new().unwrap());
    let mut state = single_host_state(upstream);
    state.notifiers = vec![Notifier::Log, Notifier::Prometheus(Arc::clone(&metrics))];
    state.metrics = Some(metrics);
    let (proxy, _p) = start_proxy(state).await;

    reqwest::get(format!("http://{proxy}/function/foo/"))
        .await
        .unwrap();

    let text = reqwest::get(format!("http://{proxy}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(text
        .contains("gateway_function_invocation_total{code=\"200\",function_name=\"foo\"} 1"));
    assert!(text.contains("gateway_functions_seconds_count{function_name=\"foo\"} 1"));
}

#[tokio::test]
async fn metrics_path_is_proxied_when_metrics_are_off() {
    let (upstream, hits, _u) = start_upstream().await;
    let (proxy, _p) = start_proxy(single_host_state(upstream)).await;

    let resp = reqwest::get(format!("http://{proxy}/metrics")).await.unwrap();

    // No exposition route exists, so the path reaches the upstream
    // like any other and goes through the rewrite.
    assert_eq!(resp.status(), 200);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(resp.text().await.unwrap(), "hello goes_in_here world");
}
