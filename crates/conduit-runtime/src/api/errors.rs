//! Error handling for the Conduit runtime API
//!
//! This module contains standardized error handling for the API.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::error::RuntimeError;

/// General error response handler for API errors
///
/// Converts a runtime error into the standardized API error response. Only
/// unknown context paths and malformed bodies surface as client errors;
/// everything else is an internal error.
pub fn api_error_response(err: &RuntimeError) -> axum::response::Response {
    let (status_code, error_code, error_message) = match err {
        RuntimeError::NotFound(resource) => (
            StatusCode::NOT_FOUND,
            "ERR_NOT_FOUND".to_string(),
            format!("{} not found", resource),
        ),
        RuntimeError::BadRequest(msg) => (
            StatusCode::BAD_REQUEST,
            "ERR_BAD_REQUEST".to_string(),
            msg.clone(),
        ),
        RuntimeError::ConfigError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_CONFIG_ERROR".to_string(),
            msg.clone(),
        ),
        RuntimeError::Connector(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_CONNECTOR_ERROR".to_string(),
            err.to_string(),
        ),
        RuntimeError::InternalError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_INTERNAL_SERVER_ERROR".to_string(),
            msg.clone(),
        ),
    };

    let body = Json(json!({
        "error": error_message,
        "errorDetails": {
            "errorCode": error_code,
            "errorMessage": error_message,
        }
    }));

    (status_code, body).into_response()
}
