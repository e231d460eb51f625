//! Error-to-response mapping for the HTTP surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use caravan_engagement::{EngagementError, StoreError};

/// Wrapper turning core errors into HTTP responses. A failed operation
/// leaves the pre-action state untouched, so every error body is safe to
/// show alongside the unchanged UI.
#[derive(Debug)]
pub struct ApiError(pub EngagementError);

impl From<EngagementError> for ApiError {
    fn from(err: EngagementError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(EngagementError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngagementError::NotFound(_) => StatusCode::NOT_FOUND,
            EngagementError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            // Retry budget exhausted; the client may simply try again.
            EngagementError::Retryable => StatusCode::CONFLICT,
            EngagementError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
