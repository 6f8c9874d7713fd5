//! HTTP route handlers for the relay.
//!
//! Ingestion routes (`/webhook`, `/fetch-messages`) are marked `no-store` so
//! no intermediary caches a write acknowledgement. Liveness routes carry no
//! cache header and no middleware beyond request tracing.
//!
//! Request tracing is enabled via middleware that assigns a request ID to
//! each incoming request, allowing correlation of all logs within a request.

pub mod health;
pub mod poll;
pub mod webhook;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CACHE_CONTROL_NO_STORE;
use crate::middleware::{request_id_layer, webhook_auth_layer};
use crate::state::AppState;

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    // Webhook - optional bearer token check
    let webhook_routes = Router::new()
        .route("/webhook", post(webhook::receive))
        .layer(middleware::from_fn_with_state(state.clone(), webhook_auth_layer));

    // Poll - invoked by an external scheduler
    let poll_routes = Router::new().route("/fetch-messages", get(poll::fetch_messages));

    let ingest_routes = Router::new()
        .merge(webhook_routes)
        .merge(poll_routes)
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_STORE),
        ));

    // Liveness - always fresh, no dependencies
    let health_routes = Router::new()
        .route("/", get(health::live))
        .route("/health", get(health::health));

    Router::new()
        .merge(ingest_routes)
        .merge(health_routes)
        .with_state(state)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
