//! Notification sinks invoked after every forwarded request.
//!
//! Sinks are fire-and-forget observers of `(method, path, status,
//! duration)`. Only two shapes exist, so [`Notifier`] is a closed enum
//! rather than trait objects. [`notify_all`] isolates each sink: a
//! panicking sink is absorbed and never affects the response already
//! sent or the sinks registered after it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};

use crate::metrics::ProxyMetrics;

use super::resolver::service_name;

#[derive(Debug, Clone)]
pub enum Notifier {
    /// One structured log line per forwarded request.
    Log,
    /// Duration histogram and invocation counter, labeled by the
    /// service name derived from the request path.
    Prometheus(Arc<ProxyMetrics>),
}

impl Notifier {
    pub fn notify(&self, method: &Method, path: &str, status: StatusCode, duration: Duration) {
        match self {
            Self::Log => {
                tracing::info!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    seconds = duration.as_secs_f64(),
                    "forwarded"
                );
            }
            Self::Prometheus(metrics) => {
                metrics.observe(
                    &service_name(path),
                    status.as_u16(),
                    duration.as_secs_f64(),
                );
            }
        }
    }
}

/// Invoke every sink in registration order, containing failures per
/// sink.
pub fn notify_all(
    notifiers: &[Notifier],
    method: &Method,
    path: &str,
    status: StatusCode,
    duration: Duration,
) {
    for notifier in notifiers {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            notifier.notify(method, path, status, duration);
        }));
    }
}
