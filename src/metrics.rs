//! Prometheus collectors and the `GET /metrics` exposition handler.
//!
//! [`ProxyMetrics`] owns a dedicated [`Registry`] rather than the
//! process-global default so parallel tests never collide on collector
//! names. Two families are registered: a duration histogram and an
//! invocation counter, both labeled by the service name derived from
//! the request path.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

pub struct ProxyMetrics {
    registry: Registry,
    functions_seconds: HistogramVec,
    function_invocation: IntCounterVec,
}

impl std::fmt::Debug for ProxyMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyMetrics").finish_non_exhaustive()
    }
}

impl ProxyMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let functions_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gateway_functions_seconds",
                "Upstream call duration in seconds",
            ),
            &["function_name"],
        )?;
        registry.register(Box::new(functions_seconds.clone()))?;

        let function_invocation = IntCounterVec::new(
            Opts::new(
                "gateway_function_invocation_total",
                "Forwarded requests by service and status code",
            ),
            &["function_name", "code"],
        )?;
        registry.register(Box::new(function_invocation.clone()))?;

        Ok(Self {
            registry,
            functions_seconds,
            function_invocation,
        })
    }

    /// Record one forwarded request under `function_name`.
    pub fn observe(&self, function_name: &str, status_code: u16, seconds: f64) {
        self.functions_seconds
            .with_label_values(&[function_name])
            .observe(seconds);
        self.function_invocation
            .with_label_values(&[function_name, &status_code.to_string()])
            .inc();
    }

    pub fn encode(&self) -> Result<(String, Vec<u8>), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

/// Text exposition of every registered collector. The route only
/// exists when `--metrics` is set; without it the path falls through
/// to the proxy like any other.
pub fn exposition(metrics: &ProxyMetrics) -> Response {
    match metrics.encode() {
        Ok((content_type, buffer)) => {
            ([(header::CONTENT_TYPE, content_type)], buffer).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_records_both_families() {
        let metrics = ProxyMetrics::new().unwrap();
        metrics.observe("figures", 200, 0.25);
        metrics.observe("figures", 200, 0.75);
        metrics.observe("figures", 502, 0.10);

        let (_, buffer) = metrics.encode().unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains(
            "gateway_function_invocation_total{code=\"200\",function_name=\"figures\"} 2"
        ));
        assert!(text.contains(
            "gateway_function_invocation_total{code=\"502\",function_name=\"figures\"} 1"
        ));
        assert!(text.contains("gateway_functions_seconds_count{function_name=\"figures\"} 3"));
    }

    #[test]
    fn registries_are_independent() {
        // Two instances must not clash on collector names.
        let a = ProxyMetrics::new().unwrap();
        let b = ProxyMetrics::new().unwrap();
        a.observe("x", 200, 0.1);

        let (_, buffer) = b.encode().unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(!text.contains("function_name=\"x\""));
    }
}
