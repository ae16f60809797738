//! Error types for the gateway.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use crate::models::ValidationError;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A required query parameter was absent or empty
    #[error("{0} is required in query parameters")]
    MissingQueryParam(String),

    /// A required body field was absent, null or empty
    #[error("{0} is required in request body")]
    MissingBodyParam(String),

    /// Request body was not valid JSON
    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    /// Upstream answered with a non-success status
    #[error("Upstream responded with {status}")]
    Upstream { status: StatusCode, body: Value },

    /// Upstream could not be reached at all
    #[error("{message}: {source}")]
    UpstreamUnavailable {
        message: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Counter storage could not be read or written
    #[error("Rate limit storage fault: {0}")]
    StorageFault(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::MissingQueryParam(_)
            | GatewayError::MissingBodyParam(_)
            | GatewayError::InvalidBody(_) => {
                let status = StatusCode::BAD_REQUEST;
                let body = ValidationError::new(self.to_string(), status);
                (status, Json(json!({ "error": body }))).into_response()
            }
            GatewayError::Upstream { status, body } => {
                (status, Json(json!({ "error": body }))).into_response()
            }
            GatewayError::UpstreamUnavailable { message, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),
            GatewayError::StorageFault(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Rate limiter unavailable" })),
            )
                .into_response(),
            other => {
                error!(error = %other, "Unhandled gateway error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Something went wrong!" })),
                )
                    .into_response()
            }
        }
    }
}
