use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

// Body of a 400 response: {"message", "error", "statusCode"}
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub message: String,
    pub error: String,
    pub status_code: u16,
}

impl ValidationError {
    pub fn new(message: String, status: StatusCode) -> Self {
        Self {
            message,
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            status_code: status.as_u16(),
        }
    }
}

// Health check response
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
