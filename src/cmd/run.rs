//! `authgate run` — start the proxy server.
//!
//! Validates the flags, wires up the resolver, notifiers, and metric
//! collectors, and serves the Axum router with graceful shutdown,
//! optionally behind TLS.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;

use crate::cli::{ResolverKind, RunArgs};
use crate::error::AuthgateError;
use crate::logging;
use crate::metrics::ProxyMetrics;
use crate::proxy::notify::Notifier;
use crate::proxy::resolver::BaseUrlResolver;
use crate::proxy::rewrite::BodyRewrite;
use crate::server::{self, AppState};

pub async fn execute(args: RunArgs) -> Result<(), AuthgateError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    // Fail fast on flags that would only surface per-request later.
    url::Url::parse(&args.upstream).map_err(|source| AuthgateError::InvalidUpstreamUrl {
        url: args.upstream.clone(),
        source,
    })?;
    HeaderValue::from_str(&args.user)
        .map_err(|_| AuthgateError::InvalidIdentity(args.user.clone()))?;

    let resolver = match args.resolver {
        ResolverKind::SingleHost => BaseUrlResolver::SingleHost {
            base_url: args.upstream.clone(),
            username: args.user.clone(),
        },
        ResolverKind::ServiceHost => BaseUrlResolver::ServiceAsHost {
            suffix: args.service_suffix.clone(),
            username: args.user.clone(),
        },
    };

    let metrics = if args.metrics {
        Some(Arc::new(ProxyMetrics::new()?))
    } else {
        None
    };

    let mut notifiers = vec![Notifier::Log];
    if let Some(metrics) = &metrics {
        notifiers.push(Notifier::Prometheus(Arc::clone(metrics)));
    }

    let state = Arc::new(AppState {
        http_client: server::build_http_client(),
        resolver,
        notifiers,
        rewrite: BodyRewrite::new(args.marker, args.replacement),
        timeout: Duration::from_secs(args.timeout_secs.max(1)),
        read_only: args.read_only,
        metrics,
    });

    let router = server::build_router(state);
    let addr: SocketAddr = args.listen.parse()?;

    tracing::info!(
        addr = %addr,
        upstream = %args.upstream,
        user = %args.user,
        read_only = args.read_only,
        metrics = args.metrics,
        "authgate started"
    );

    match (args.cert.as_deref(), args.key.as_deref()) {
        (Some(cert), Some(key)) => serve_tls(addr, router, cert, key).await?,
        (None, None) => serve_plain(addr, router).await?,
        _ => return Err(AuthgateError::IncompleteTls),
    }

    tracing::info!("authgate stopped");
    Ok(())
}

async fn serve_plain(addr: SocketAddr, router: Router) -> Result<(), AuthgateError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;
    Ok(())
}

async fn serve_tls(
    addr: SocketAddr,
    router: Router,
    cert: &Path,
    key: &Path,
) -> Result<(), AuthgateError> {
    let tls = RustlsConfig::from_pem_file(cert, key).await?;

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        server::shutdown_signal().await;
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await?;
    Ok(())
}
