//! Error responses.
//!
//! # Design Decisions
//! - Errors are JSON: `{"error": "<message>"}`
//! - A propagated upstream failure is a 500; an open-circuit fallback is a
//!   normal 200 and never reaches this module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Handler error rendered as a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// A 500 with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(status = %self.status, "Error: {}", self.message);
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
