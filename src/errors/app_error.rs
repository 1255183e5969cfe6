//! HTTP-facing error type for the webhook handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::bridge_error::BridgeError;

/// Result type for HTTP handlers.
pub type AppResult<T> = Result<T, AppError>;

/// Errors returned from HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Bridge(BridgeError::SessionBusy) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Bridge(BridgeError::SessionNotReady) => StatusCode::CONFLICT,
            AppError::Bridge(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            // Twilio only needs the status; a body here would be read as TwiML.
            AppError::Bridge(BridgeError::Connect(_)) => status.into_response(),
            other => (
                status,
                Json(serde_json::json!({ "error": other.to_string() })),
            )
                .into_response(),
        }
    }
}
