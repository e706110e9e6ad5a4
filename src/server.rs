//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the HTTP
//! client, resolver, notifiers, and per-request settings),
//! [`build_router`] for constructing the Axum router,
//! [`build_http_client`] for the connection-pooled hyper client, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::metrics::{self, ProxyMetrics};
use crate::proxy;
use crate::proxy::notify::Notifier;
use crate::proxy::resolver::BaseUrlResolver;
use crate::proxy::rewrite::BodyRewrite;

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Outbound client parameterized over the axum body type so inbound
/// request bodies stream through without buffering.
pub type HttpClient = Client<HttpsConnector, axum::body::Body>;

pub struct AppState {
    pub http_client: HttpClient,
    pub resolver: BaseUrlResolver,
    pub notifiers: Vec<Notifier>,
    pub rewrite: BodyRewrite,
    pub timeout: Duration,
    pub read_only: bool,
    pub metrics: Option<Arc<ProxyMetrics>>,
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls
    // cannot auto-detect which one to use. Explicitly install `ring`
    // as the default provider.
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

pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new().route("/logout", get(logout_handler));

    if let Some(metrics) = &state.metrics {
        let metrics = Arc::clone(metrics);
        router = router.route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move { metrics::exposition(&metrics) }
            }),
        );
    }

    router
        .fallback(proxy::forward_handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Clearing the upstream session is the upstream's business; the proxy
/// just bounces the browser back to the root.
async fn logout_handler() -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/")]).into_response()
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
