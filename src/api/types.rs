//! API error body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::config::ConfigError;
use crate::error::SimError;

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Offending field, when the error names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn bad_request(error: impl Into<String>) -> Response {
        let body = Self {
            error: error.into(),
            field: None,
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

impl From<ConfigError> for ErrorResponse {
    fn from(e: ConfigError) -> Self {
        Self {
            error: e.to_string(),
            field: Some(e.field),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

impl From<SimError> for ErrorResponse {
    fn from(e: SimError) -> Self {
        match e {
            SimError::Config(config) => config.into(),
            other => Self {
                error: other.to_string(),
                field: None,
            },
        }
    }
}
