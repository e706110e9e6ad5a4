//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum, and the
//! [`RunArgs`] struct carrying every proxy flag. Every flag has an
//! environment variable equivalent for container deployments.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "authgate",
    version,
    about = "Authenticating reverse proxy for dashboard backends",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        authgate run                                Proxy http://localhost:3000 as admin\n  \
        authgate run --upstream http://grafana:3000 Proxy a specific backend\n  \
        authgate run --metrics                      Also expose /metrics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Run(Box<RunArgs>),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        authgate run --upstream http://grafana:3000 --user viewer\n  \
        authgate run --read-only false --timeout-secs 30\n  \
        authgate run --resolver service-host --service-suffix svc.cluster.local\n  \
        authgate run --cert tls.crt --key tls.key --metrics")]
pub struct RunArgs {
    /// Listen address
    #[arg(short, long, env = "PROXY_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Upstream dashboard base URL
    #[arg(long, env = "UPSTREAM_URL", default_value = "http://localhost:3000")]
    pub upstream: String,

    /// Identity asserted to the upstream via X-WEBAUTH-USER
    #[arg(short, long, env = "AUTH_USER", default_value = "admin")]
    pub user: String,

    /// Upstream resolution strategy
    #[arg(long, env = "RESOLVER", default_value = "single-host")]
    pub resolver: ResolverKind,

    /// DNS suffix appended to the service name (service-host resolver only)
    #[arg(long, env = "SERVICE_SUFFIX")]
    pub service_suffix: Option<String>,

    /// Only forward GET requests (POST /api/tsdb/ is always allowed)
    #[arg(
        long,
        env = "READ_ONLY",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub read_only: bool,

    // -- Observability --
    /// Expose prometheus metrics on GET /metrics
    #[arg(long, env = "PROXY_METRICS", help_heading = "Observability")]
    pub metrics: bool,

    // -- Body rewriting --
    /// Marker token replaced in every upstream response body
    #[arg(
        long,
        env = "BODY_MARKER",
        default_value = "$your_template_variable",
        help_heading = "Body rewriting"
    )]
    pub marker: String,

    /// Replacement token written in place of the marker
    #[arg(
        long,
        env = "BODY_REPLACEMENT",
        default_value = "goes_in_here",
        help_heading = "Body rewriting"
    )]
    pub replacement: String,

    // -- TLS --
    /// TLS certificate path (PEM)
    #[arg(long, env = "TLS_CERT", help_heading = "TLS")]
    pub cert: Option<PathBuf>,

    /// TLS private key path (PEM)
    #[arg(long, env = "TLS_KEY", help_heading = "TLS")]
    pub key: Option<PathBuf>,

    // -- Logging --
    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Upstream request deadline in seconds
    #[arg(
        long,
        env = "PROXY_TIMEOUT_SECS",
        default_value_t = 60,
        help_heading = "Tuning"
    )]
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ResolverKind {
    /// One fixed upstream for every request
    SingleHost,
    /// Derive the upstream host from the /function/<name> path segment
    ServiceHost,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}
