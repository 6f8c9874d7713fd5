//! HTTP server module with optional TLS.
//!
//! This module serves the relay in one of two modes:
//! - **None (default)**: Plain HTTP, for deployments behind a TLS-terminating proxy
//! - **Manual**: User-provided certificate and key files
//!
//! The server includes:
//! - Graceful shutdown on SIGTERM/SIGINT
//! - Certificate hot-reload via SIGHUP (manual mode)

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
