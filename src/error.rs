//! Unified error types for authgate.
//!
//! [`AuthgateError`] covers startup and bootstrap failures (bad flags,
//! unusable TLS material, listener errors) and uses `thiserror` for
//! `Display` and `Error` derives. Per-request forwarding failures never
//! terminate the process and live in
//! [`ForwardError`](crate::proxy::forward::ForwardError) instead.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthgateError {
    #[error("Invalid upstream URL '{url}': {source}\n  Expected something like http://localhost:3000")]
    InvalidUpstreamUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Identity '{0}' is not a legal header value")]
    InvalidIdentity(String),

    #[error("Invalid listen address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("--cert and --key must be provided together")]
    IncompleteTls,

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
