//! Handler for location webhooks pushed by nRF Cloud.

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use crate::error::AppError;
use crate::payload::WebhookEvent;
use crate::state::AppState;

/// Store the location carried by a pushed event.
///
/// Events without a complete location are acknowledged and dropped. Each
/// delivery inserts a new record, so a redelivered event is stored twice.
#[instrument(
    name = "webhook::receive",
    skip(state, payload),
    fields(device_id = tracing::field::Empty)
)]
pub async fn receive(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<&'static str, AppError> {
    state.store.ensure_connected().await?;

    tracing::debug!(payload = %payload, "Received webhook");

    let event = WebhookEvent::from_payload(&payload);
    let Some(record) = event.into_record(payload, Utc::now()) else {
        tracing::debug!("Event carries no location, ignoring");
        return Ok("OK");
    };

    if let Some(device_id) = record.device_id.as_deref() {
        tracing::Span::current().record("device_id", device_id);
    }

    state.store.insert(&record).await?;
    tracing::info!(
        lat = record.lat,
        lng = record.lng,
        timestamp = %record.timestamp,
        "Saved webhook location"
    );

    Ok("OK")
}
