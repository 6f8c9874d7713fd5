//! Handler that pulls recent messages from the nRF Cloud API.
//!
//! Meant to be triggered by an external scheduler. Each call covers the
//! trailing poll window and upserts location messages by
//! `(deviceId, receivedAt)`, so overlapping or repeated polls never duplicate
//! records.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, JsonError};
use crate::nrf_cloud::PollWindow;
use crate::payload::record_from_item;
use crate::state::AppState;

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    /// Items returned by the API across all pages
    pub fetched: usize,
    /// Location records upserted
    pub saved: usize,
}

/// `GET /fetch-messages`
#[instrument(name = "poll::fetch_messages", skip(state))]
pub async fn fetch_messages(State(state): State<AppState>) -> Result<Json<PollSummary>, JsonError> {
    Ok(Json(poll_once(&state).await?))
}

/// Fetch the trailing window and upsert every usable location message.
///
/// A write failure aborts the rest of the batch; the next poll covers the
/// same items again.
pub async fn poll_once(state: &AppState) -> Result<PollSummary, AppError> {
    state.store.ensure_connected().await?;

    let window = PollWindow::trailing(Utc::now(), state.config.poll.window());
    let items = state.nrf_cloud.fetch_messages(&window).await?;

    let mut saved = 0;
    for item in &items {
        let Some(record) = record_from_item(item) else {
            continue;
        };
        state.store.upsert(&record).await?;
        saved += 1;
    }

    let summary = PollSummary {
        fetched: items.len(),
        saved,
    };
    tracing::info!(fetched = summary.fetched, saved = summary.saved, "Poll completed");
    Ok(summary)
}
