//! Error types surfaced at the HTTP boundary.
//!
//! Handler failures are collected into [`AppError`]. The webhook renders it as
//! a plaintext 500; the poll endpoint wraps it in [`JsonError`] to report the
//! message and its source chain as JSON.

use std::error::Error as _;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::nrf_cloud::UpstreamError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl AppError {
    /// Messages of every error in the source chain, outermost first
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();
        while let Some(err) = source {
            let message = err.to_string();
            if chain.last() != Some(&message) {
                chain.push(message);
            }
            source = err.source();
        }
        chain
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, chain = ?self.chain(), "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

/// JSON body of a failed poll
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub stack: String,
}

/// [`AppError`] rendered as `{ "error", "stack" }`
#[derive(Debug)]
pub struct JsonError(pub AppError);

impl From<AppError> for JsonError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let chain = self.0.chain();
        tracing::error!(error = %self.0, chain = ?chain, "Request failed");

        let body = ErrorBody {
            error: self.0.to_string(),
            stack: chain.join("\ncaused by: "),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_chain_starts_with_display() {
        let err = AppError::from(UpstreamError::MissingApiKey);
        assert_eq!(err.chain(), vec!["NRF_CLOUD_API_KEY is not configured".to_string()]);
    }

    #[test]
    fn test_app_error_is_plaintext_500() {
        let response =
            AppError::from(StoreError::ConnectTimeout(Duration::from_secs(5))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_json_error_is_500() {
        let response = JsonError(AppError::from(StoreError::Unavailable("down".to_string())))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(axum::http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
