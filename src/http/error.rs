//! HTTP error type and its mapping from pipeline errors

use crate::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Error returned by HTTP handlers
#[derive(Debug, Error)]
pub enum HttpError {
    /// Bad request (invalid input or unusable source).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body over the configured limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The extractor ran and failed; carries its captured output.
    #[error("Extractor failed: {message}")]
    ExtractorFailed {
        kind: &'static str,
        message: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    /// Stable error type discriminant for client-side handling
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    error_type: Option<&'static str>,
    /// Extractor stderr, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message, error_type, detail, metadata) = match self {
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None, None, None),
            HttpError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, msg, None, None, None)
            }
            HttpError::ExtractorFailed {
                kind,
                message,
                exit_code,
                stdout,
                stderr,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                message,
                Some(kind),
                Some(stderr.clone()),
                Some(serde_json::json!({
                    "exitCode": exit_code,
                    "stdout": stdout,
                    "stderr": stderr,
                })),
            ),
            HttpError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None, None, None),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
            error_type,
            detail,
            metadata,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        let message = err.client_message();
        match err {
            Error::ExtractorFailed {
                code,
                stdout,
                stderr,
            } => HttpError::ExtractorFailed {
                kind: "EXTRACTOR_FAILED",
                message,
                exit_code: code,
                stdout,
                stderr,
            },
            Error::ExtractorTimeout { stdout, stderr, .. } => HttpError::ExtractorFailed {
                kind: "EXTRACTOR_TIMEOUT",
                message,
                exit_code: None,
                stdout,
                stderr,
            },
            Error::ExtractorOutput { stdout, stderr, .. } => HttpError::ExtractorFailed {
                kind: "EXTRACTOR_OUTPUT",
                message,
                exit_code: Some(0),
                stdout,
                stderr,
            },
            other if other.is_client_error() => HttpError::BadRequest(message),
            _ => HttpError::Internal(message),
        }
    }
}
