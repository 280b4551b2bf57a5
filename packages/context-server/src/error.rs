use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use context_extraction::PipelineError;
use serde_json::json;
use thiserror::Error;

/// Errors a request can end with.
///
/// Pipeline failures that are data (sentinels) never get here; they are
/// part of a normal `200` response with status `failed`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid form data: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Multipart(e) => e.status(),
            Self::Pipeline(PipelineError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
