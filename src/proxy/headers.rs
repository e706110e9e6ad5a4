//! Header multimap copying and proxy header injection.
//!
//! Inbound and outbound header sets must never share mutable state, so
//! [`copy_headers`] performs an explicit per-entry copy that preserves
//! the order of repeated values. [`build_upstream_headers`] layers the
//! proxy-authoritative headers on top: `X-Forwarded-For` and the
//! identity assertion always overwrite whatever the client supplied,
//! and `Host` is rewritten to the upstream authority.

use axum::http::uri::Authority;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Identity assertion header consumed by the upstream's auth-proxy mode.
pub const WEBAUTH_USER: HeaderName = HeaderName::from_static("x-webauth-user");

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Append every entry of `source` into `destination`, cloning each
/// value. Repeated header values keep their relative order.
pub fn copy_headers(destination: &mut HeaderMap, source: &HeaderMap) {
    for key in source.keys() {
        for value in source.get_all(key) {
            destination.append(key.clone(), value.clone());
        }
    }
}

/// Build the outbound header set for an upstream request.
pub fn build_upstream_headers(
    original: &HeaderMap,
    remote_addr: &str,
    user: &str,
    upstream_authority: Option<&Authority>,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(original.len() + 2);
    copy_headers(&mut headers, original);

    // The proxy is the sole authority on these two, so insert (which
    // drops all prior values) rather than append.
    if let Ok(val) = HeaderValue::from_str(remote_addr) {
        headers.insert(X_FORWARDED_FOR, val);
    }
    if let Ok(val) = HeaderValue::from_str(user) {
        headers.insert(WEBAUTH_USER, val);
    }

    // The inbound Host names the proxy itself; the upstream expects its own.
    if let Some(authority) = upstream_authority {
        if let Ok(val) = HeaderValue::from_str(authority.as_str()) {
            headers.insert(header::HOST, val);
        }
    }

    headers
}
