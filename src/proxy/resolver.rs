//! Upstream base URL and identity resolution.
//!
//! [`BaseUrlResolver`] decides, per request, which upstream to call and
//! which identity to assert. Only two shapes exist, so a closed enum is
//! used instead of trait objects. Resolution never performs I/O and
//! never fails: a malformed service name simply produces a well-formed
//! but unreachable URL, surfaced later as a transport error.

/// Path prefix under which per-service routing and metric labeling apply.
pub const FUNCTION_PREFIX: &str = "/function/";

/// Port every dynamically named backend listens on.
const WATCHDOG_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub enum BaseUrlResolver {
    /// One fixed upstream, independent of the request.
    SingleHost { base_url: String, username: String },
    /// Upstream host synthesized from the `/function/<name>` path segment,
    /// optionally qualified with a DNS suffix.
    ServiceAsHost {
        suffix: Option<String>,
        username: String,
    },
}

impl BaseUrlResolver {
    /// Compute `(base_url, identity)` for a request path. The returned
    /// base URL never carries a trailing slash.
    pub fn resolve(&self, path: &str) -> (String, String) {
        match self {
            Self::SingleHost { base_url, username } => {
                let base = base_url.strip_suffix('/').unwrap_or(base_url);
                (base.to_string(), username.clone())
            }
            Self::ServiceAsHost { suffix, username } => {
                let name = service_name(path);
                let qualified = match suffix.as_deref() {
                    Some(s) if !s.is_empty() => format!("{name}.{s}"),
                    _ => name,
                };
                (
                    format!("http://{qualified}:{WATCHDOG_PORT}"),
                    username.clone(),
                )
            }
        }
    }
}

/// Derive a service name from a request path: strip the `/function/`
/// prefix, trim surrounding slashes, and keep the first remaining
/// segment. Paths outside the prefix yield an empty name. Shared by the
/// path-derived resolver and the metrics notifier.
pub fn service_name(path: &str) -> String {
    let Some(rest) = path.strip_prefix(FUNCTION_PREFIX) else {
        return String::new();
    };
    rest.trim_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
