//! Centrifuge is a TCP/TLS connection router.
//!
//! It accepts connections on one port, optionally terminates TLS, reads
//! the first bytes the client sends and picks a backend by SNI host name
//! and longest matching byte prefix. The client and backend are then
//! joined by a bidirectional byte relay that preserves half-close.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate).
//! - [`config`] -- Directive grammar, config file loading, CLI merging and
//!   validation.
//! - [`error`] -- Startup and per-connection error types using `thiserror`.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- The per-connection pipeline: sniff, route, dial, rewrite,
//!   relay.
//! - [`server`] -- Accept loop, connection statistics, and graceful shutdown.
//! - [`tls`] -- Listener certificates by SNI and backend client configuration.
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
pub mod logging;
pub mod proxy;
pub mod server;
pub mod tls;

#[cfg(feature = "sentry-integration")]
pub mod sentry_integration;
