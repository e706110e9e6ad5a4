//! Literal byte-level substitution applied to upstream response bodies.
//!
//! The marker and replacement tokens are configuration, not part of the
//! contract: the proxy replaces every non-overlapping occurrence and
//! the forwarding engine recomputes `Content-Length` afterwards, since
//! the substitution may change the body length.

use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct BodyRewrite {
    marker: Vec<u8>,
    replacement: Vec<u8>,
}

impl BodyRewrite {
    #[must_use]
    pub fn new(marker: impl Into<Vec<u8>>, replacement: impl Into<Vec<u8>>) -> Self {
        Self {
            marker: marker.into(),
            replacement: replacement.into(),
        }
    }

    /// Replace every occurrence of the marker. Bodies without a match
    /// (and empty markers) are returned as-is without copying.
    #[must_use]
    pub fn apply(&self, body: Bytes) -> Bytes {
        if self.marker.is_empty() || find(&body, &self.marker).is_none() {
            return body;
        }
        Bytes::from(replace_all(&body, &self.marker, &self.replacement))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(idx) = find(rest, needle) {
        out.extend_from_slice(&rest[..idx]);
        out.extend_from_slice(replacement);
        rest = &rest[idx + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}
