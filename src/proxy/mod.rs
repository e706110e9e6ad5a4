//! Core HTTP request forwarding.
//!
//! The [`forward_handler`] function is the Axum fallback that receives
//! every request not claimed by `/logout` or `/metrics`, resolves the
//! upstream, and delegates to the forwarding engine. Submodules handle
//! upstream resolution ([`resolver`]), header copying ([`headers`]),
//! body substitution ([`rewrite`]), the engine itself ([`forward`]),
//! and post-forward observers ([`notify`]).

pub mod forward;
pub mod headers;
pub mod notify;
pub mod resolver;
pub mod rewrite;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::server::AppState;

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if state.read_only && !read_only_allows(&method, &path) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    // Resolution is computed fresh per request; the path-derived
    // resolver depends on the path contents.
    let (base_url, user) = state.resolver.resolve(&path);
    let remote_addr = addr.to_string();

    let start = Instant::now();
    let (response, outcome) = forward::forward_request(
        &state.http_client,
        req,
        &remote_addr,
        &base_url,
        &user,
        state.timeout,
        &state.rewrite,
    )
    .await;
    let duration = start.elapsed();

    if let Some(error) = &outcome.error {
        tracing::error!(path = %path, error = %error, "upstream request failed");
    }

    notify::notify_all(&state.notifiers, &method, &path, outcome.status, duration);

    response
}

/// In read-only mode only `GET` is proxied, except dashboard snapshot
/// queries (`POST /api/tsdb/`) which are always allowed.
fn read_only_allows(method: &Method, path: &str) -> bool {
    *method == Method::GET || (*method == Method::POST && path.starts_with("/api/tsdb/"))
}
