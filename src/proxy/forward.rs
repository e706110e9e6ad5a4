//! The forwarding engine: one upstream call per inbound request.
//!
//! [`forward_request`] rebuilds the inbound request against the
//! resolved base URL, issues it under a deadline, rewrites the response
//! body, and hands back a complete outbound response together with the
//! [`ForwardOutcome`] consumed by the notification sinks. Nothing is
//! written to the client until the upstream response is fully
//! transformed, so every failure path yields a clean error status with
//! an empty body. No retries are attempted.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode, Uri};
use axum::response::Response;
use http_body_util::BodyExt;

use crate::server::HttpClient;

use super::headers;
use super::rewrite::BodyRewrite;

/// Per-request failure classification. These are reported to the
/// caller for logging and notification only; they never propagate as
/// process faults.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("upstream did not respond within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("upstream request failed: {0}")]
    Transport(#[source] hyper_util::client::legacy::Error),

    #[error("could not build upstream request: {0}")]
    RequestBuild(#[source] axum::http::Error),

    #[error("reading upstream body failed: {0}")]
    BodyRead(#[source] hyper::Error),
}

impl ForwardError {
    /// Status reported to the client when this failure occurs.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::DeadlineExceeded(_) | Self::Transport(_) | Self::RequestBuild(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::BodyRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// What a completed forwarding attempt looked like, successful or not.
#[derive(Debug)]
pub struct ForwardOutcome {
    pub status: StatusCode,
    pub error: Option<ForwardError>,
}

pub async fn forward_request(
    client: &HttpClient,
    req: Request<Body>,
    remote_addr: &str,
    base_url: &str,
    user: &str,
    timeout: Duration,
    rewrite: &BodyRewrite,
) -> (Response, ForwardOutcome) {
    let (parts, inbound_body) = req.into_parts();

    let mut url = format!("{base_url}{}", parts.uri.path());
    if let Some(query) = parts.uri.query() {
        url.push('?');
        url.push_str(query);
    }

    let uri = match Uri::try_from(url) {
        Ok(uri) => uri,
        Err(e) => return fail(ForwardError::RequestBuild(e.into())),
    };

    let upstream_headers =
        headers::build_upstream_headers(&parts.headers, remote_addr, user, uri.authority());

    // The inbound body streams through unbuffered.
    let mut upstream_req = match Request::builder()
        .method(parts.method)
        .uri(uri)
        .body(inbound_body)
    {
        Ok(req) => req,
        Err(e) => return fail(ForwardError::RequestBuild(e)),
    };
    *upstream_req.headers_mut() = upstream_headers;

    // Deadline measured from the moment the upstream call starts. On
    // expiry the in-flight call is dropped, which aborts the connection.
    let upstream_res = match tokio::time::timeout(timeout, client.request(upstream_req)).await {
        Ok(Ok(res)) => res,
        Ok(Err(e)) => return fail(ForwardError::Transport(e)),
        Err(_) => return fail(ForwardError::DeadlineExceeded(timeout)),
    };

    let (res_parts, res_body) = upstream_res.into_parts();

    // Substitution may span network reads, so the body is buffered in
    // full before rewriting.
    let collected = match res_body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return fail(ForwardError::BodyRead(e)),
    };
    let rewritten = rewrite.apply(collected);

    let mut out_headers = HeaderMap::with_capacity(res_parts.headers.len());
    headers::copy_headers(&mut out_headers, &res_parts.headers);
    // The body is no longer streamed and its length may have changed.
    out_headers.remove(header::TRANSFER_ENCODING);
    out_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));

    let status = res_parts.status;
    let mut response = Response::new(Body::from(rewritten));
    *response.status_mut() = status;
    *response.headers_mut() = out_headers;

    (
        response,
        ForwardOutcome {
            status,
            error: None,
        },
    )
}

fn fail(error: ForwardError) -> (Response, ForwardOutcome) {
    let status = error.status();
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    (
        response,
        ForwardOutcome {
            status,
            error: Some(error),
        },
    )
}
