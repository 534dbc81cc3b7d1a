//! Admin API handlers for the Conduit runtime
//!
//! Exposes the active-connector query surface used by operators.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use conduit_core::{Health, ProcessDefinitionKey};

use crate::registry::ActiveConnectorQuery;
use crate::runtime::ConnectorRuntime;

/// Summary of one active connector
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorSummary {
    pub connector_type: String,
    pub process_definition_key: ProcessDefinitionKey,
    pub bpmn_process_id: String,
    pub version: u32,
    pub element_id: String,
    pub health: Health,
}

/// Query parameters for listing active connectors
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorQueryParams {
    pub bpmn_process_id: Option<String>,
    #[serde(rename = "type")]
    pub connector_type: Option<String>,
    pub element_id: Option<String>,
}

/// Handler for listing active connectors, optionally filtered
pub async fn list_connectors_handler(
    State(runtime): State<Arc<ConnectorRuntime>>,
    Query(params): Query<ConnectorQueryParams>,
) -> impl IntoResponse {
    let query = ActiveConnectorQuery {
        bpmn_process_id: params.bpmn_process_id,
        connector_type: params.connector_type,
        element_id: params.element_id,
    };
    Json(runtime.active_connectors(&query))
}
