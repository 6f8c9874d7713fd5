//! Liveness endpoints.
//!
//! Both return 200 as long as the process can answer HTTP. Neither touches the
//! database, so a store outage never makes the relay look dead.

use crate::config::LIVENESS_MESSAGE;

/// Root handler confirming the receiver is up.
pub async fn live() -> &'static str {
    LIVENESS_MESSAGE
}

/// Health check handler for container orchestration probes.
pub async fn health() -> &'static str {
    "ok"
}
