//! Authgate is an authenticating reverse proxy for dashboard backends.
//!
//! It sits in front of a single upstream HTTP service (a Grafana-style
//! dashboarding backend running in auth-proxy mode), forwards every
//! request under an injected `X-WEBAUTH-USER` identity header, rewrites
//! a marker token in each response body, and reports per-route
//! timing/status metrics to registered notification sinks.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution.
//! - [`error`] -- Startup error types using `thiserror`.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`metrics`] -- Prometheus collectors and the `/metrics` exposition handler.
//! - [`proxy`] -- Core forwarding: upstream resolution, header copying, the
//!   deadline-bound forwarding engine, body rewriting, and notification sinks.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.

// Binary crate — public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod server;
