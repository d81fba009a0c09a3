//! beacon-scrub is a reverse proxy for analytics beacons.
//!
//! It sits between browsers and the Mixpanel ingestion API. For every
//! beacon routed through it, the project API key is written into each
//! event's `properties.token` and the URL-derived properties that leak
//! where the user was (`$referrer`, `$current_url`, ...) are overwritten
//! with placeholders before the request is forwarded upstream.
//!
//! # Architecture
//!
//! - [`rewrite`] -- The host-independent body rewriter: envelope decoding
//!   (form `data=` or raw JSON), token injection, and clear-list scrubbing.
//! - [`middleware`] -- Axum middleware that runs the rewriter on matching
//!   requests and fixes `Content-Length`.
//! - [`proxy`] -- Route matching, header construction, and forwarding to the
//!   upstream collector.
//! - [`config`] -- Configuration loading, validation, and hot-reloading via the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health,
//!   scrub).
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `sentry-integration` | Sentry error tracking |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod rewrite;
pub mod server;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
