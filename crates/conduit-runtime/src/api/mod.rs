//! API module for the Conduit runtime
//!
//! This module contains the API routes and handlers for the runtime: the
//! inbound webhook endpoint, the health check, and the admin query surface.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod errors;
pub mod health;

use crate::error::RuntimeError;
use crate::runtime::ConnectorRuntime;

/// Build the router for API endpoints
pub fn build_router(runtime: Arc<ConnectorRuntime>) -> Router {
    Router::new()
        // Inbound webhooks
        .route("/inbound/:context", post(handle_inbound))
        // Connector management
        .route("/v1/admin/connectors", get(admin::list_connectors_handler))
        // Health check
        .route("/health", get(health::health_check))
        // Tracing
        .layer(TraceLayer::new_for_http())
        // Shared state
        .with_state(runtime)
}

/// Handler for inbound webhook requests.
///
/// The body stays raw bytes end to end so the HMAC signature is computed
/// over exactly what was sent.
async fn handle_inbound(
    State(runtime): State<Arc<ConnectorRuntime>>,
    Path(context): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(executor) = runtime.webhook_executor() else {
        return errors::api_error_response(&RuntimeError::NotFound(format!(
            "Webhook for context '{}'",
            context
        )));
    };

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let header_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = if body.is_empty() { None } else { Some(&body[..]) };
    match executor
        .handle(&context, body, &header_map, content_type.as_deref())
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => errors::api_error_response(&err),
    }
}
