//! API errors and their HTTP status mapping.

use crate::error::ServiceError;
use crate::output::ErrorResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// The only request field that can fail validation.
pub const PAYLOAD_FIELD: &str = "pdf_base64";

/// Errors returned by handlers. Each variant has exactly one status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The `pdf_base64` field is missing, mistyped or invalid.
    #[error("{0}")]
    Validation(String),
    /// The body is not a JSON document at all.
    #[error("{0}")]
    MalformedBody(String),
    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::Validation(msg),
            ServiceError::EngineUnavailable(msg) => ApiError::Unavailable(msg),
            ServiceError::Decode(msg) | ServiceError::Conversion(msg) | ServiceError::Publish(msg) => {
                ApiError::Failed(msg)
            }
            ServiceError::InvalidConfig(msg) | ServiceError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(msg) => {
                tracing::info!(%msg, "Rejected invalid request");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorResponse::validation(&["body", PAYLOAD_FIELD], msg),
                )
            }
            ApiError::MalformedBody(msg) => {
                tracing::info!(%msg, "Rejected malformed body");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorResponse::validation(&["body"], msg),
                )
            }
            ApiError::PayloadTooLarge(msg) => {
                tracing::info!(%msg, "Rejected oversized request");
                (StatusCode::PAYLOAD_TOO_LARGE, ErrorResponse::new(msg))
            }
            ApiError::Unavailable(msg) => {
                tracing::warn!(%msg, "Engine unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, ErrorResponse::new(msg))
            }
            ApiError::Failed(msg) => {
                tracing::error!(%msg, "Conversion failed");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(msg))
            }
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
