//! Health check endpoint for the Conduit runtime
//!
//! This module contains the health check handler.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::runtime::ConnectorRuntime;

/// Health check handler
///
/// Reports runtime status and registry counts.
pub async fn health_check(State(runtime): State<Arc<ConnectorRuntime>>) -> impl IntoResponse {
    debug!("Health check requested");

    let registry = runtime.registry();
    Json(json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
        "webhookEnabled": runtime.webhook_executor().is_some(),
        "activeConnectors": registry.active_count(),
        "registeredProcessDefinitions": registry.registered_count(),
    }))
}
