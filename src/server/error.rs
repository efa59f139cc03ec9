//! Server error type.
//!
//! Handlers return `Result<T, ServerError>`; the [`IntoResponse`] impl turns
//! each variant into a status code plus a `{"error": ...}` body. Internal
//! detail is logged, never sent to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::MuxError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// A required part is missing or empty.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The body exceeded the configured upload limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The multipart body could not be decoded.
    #[error("form parse error: {0}")]
    Parse(String),

    /// The transcoder reported failure or could not be started.
    #[error("transcode error: {0}")]
    Transcode(MuxError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
            ServerError::Parse(m) => {
                error!(error = %m, "form parse error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Form parsing failed".to_owned())
            }
            ServerError::Transcode(e) => {
                error!(error = %e, "transcode error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to convert file".to_owned())
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for ServerError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(e.body_text())
        } else {
            ServerError::Parse(e.body_text())
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Internal(e.to_string())
    }
}
