//! telepathy-echo: a gRPC echo service
//!
//! The `Echo` service waits for the requested delay and answers with the
//! request message prefixed by `"hello "`.
//!
//! Features:
//! - Non-blocking per-request delay on a bounded tokio worker pool
//! - Cap on concurrently handled calls
//! - Port from `TELEPATHY_SVC_PORT`, everything else via CLI or TOML file
//! - Graceful shutdown on SIGINT/SIGTERM
//! - A batch client for driving load against a running server

pub mod client;
pub mod config;
pub mod logging;
pub mod proto;
pub mod server;
pub mod service;
