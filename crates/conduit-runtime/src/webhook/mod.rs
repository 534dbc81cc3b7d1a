//! Webhook correlation engine.
//!
//! Given one inbound request, the engine consults the router for the
//! eligible connectors, then evaluates each candidate independently:
//! signature validation, activation condition, variable extraction,
//! correlation. Per-candidate outcomes are aggregated into a single
//! [`WebhookResponse`]; one failing connector never affects its siblings on
//! the same context path.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use conduit_core::{ConnectorError, ConnectorResult, ProcessInstanceRef, WebhookProperties};

use crate::error::{RuntimeError, RuntimeResult};
use crate::expression::ExpressionEngine;
use crate::metrics::{
    MetricsRecorder, ACTION_COMPLETED, ACTION_FAILED, ACTION_RECEIVED, METRIC_INBOUND_TRIGGERS,
};
use crate::registry::ActiveConnector;
use crate::router::WebhookRouter;

pub mod hmac;

/// Connector type label used for webhook trigger metrics
pub const TYPE_WEBHOOK: &str = "webhook";

const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Aggregated per-path outcome of one inbound request
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    /// Connectors whose signature validation rejected the request
    pub unauthorized_connectors: Vec<String>,
    /// Connectors whose activation condition evaluated to false
    pub unactivated_connectors: Vec<String>,
    /// Connector id -> started process instance
    pub executed_connectors: HashMap<String, ProcessInstanceRef>,
    /// Connector id -> failure cause
    pub errors: HashMap<String, String>,
}

enum Outcome {
    Unauthorized,
    Unactivated,
    Executed(ProcessInstanceRef),
}

/// Handles inbound webhook requests against the router
pub struct WebhookExecutor {
    router: Arc<WebhookRouter>,
    expressions: Arc<dyn ExpressionEngine>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl WebhookExecutor {
    pub fn new(
        router: Arc<WebhookRouter>,
        expressions: Arc<dyn ExpressionEngine>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            router,
            expressions,
            metrics,
        }
    }

    /// Process one inbound request for a context path.
    ///
    /// Only an unknown context path or an unparseable body surface as
    /// errors; every per-connector failure is reported inside the response.
    pub async fn handle(
        &self,
        context_path: &str,
        body: Option<&[u8]>,
        headers: &HashMap<String, String>,
        content_type: Option<&str>,
    ) -> RuntimeResult<WebhookResponse> {
        debug!(%context_path, "Received inbound webhook");

        if !self.router.contains(context_path) {
            return Err(RuntimeError::NotFound(format!(
                "Webhook for context '{}'",
                context_path
            )));
        }
        self.metrics
            .increase(METRIC_INBOUND_TRIGGERS, ACTION_RECEIVED, TYPE_WEBHOOK);

        let body_value = parse_body(body, content_type)?;
        let evaluation_context = json!({
            "request": {
                "body": body_value,
                "headers": headers,
            }
        });

        let mut response = WebhookResponse::default();
        for connector in self.router.lookup(context_path) {
            let Some(properties) = connector.webhook_properties() else {
                continue;
            };
            let connector_id = properties.connector_identifier();
            let result = self
                .process_connector(
                    &connector,
                    &properties,
                    body.unwrap_or_default(),
                    headers,
                    &evaluation_context,
                )
                .await;
            match result {
                Ok(Outcome::Unauthorized) => {
                    debug!(%context_path, %connector_id, "HMAC validation failed");
                    response.unauthorized_connectors.push(connector_id);
                }
                Ok(Outcome::Unactivated) => {
                    debug!(%context_path, %connector_id, "Activation condition not met");
                    response.unactivated_connectors.push(connector_id);
                }
                Ok(Outcome::Executed(instance)) => {
                    debug!(%context_path, %connector_id, instance_key = instance.process_instance_key, "Webhook correlated");
                    response.executed_connectors.insert(connector_id, instance);
                }
                Err(err) => {
                    error!(%context_path, %connector_id, ?err, "Webhook connector failed");
                    self.metrics
                        .increase(METRIC_INBOUND_TRIGGERS, ACTION_FAILED, TYPE_WEBHOOK);
                    response.errors.insert(connector_id, err.to_string());
                }
            }
        }

        self.metrics
            .increase(METRIC_INBOUND_TRIGGERS, ACTION_COMPLETED, TYPE_WEBHOOK);
        Ok(response)
    }

    async fn process_connector(
        &self,
        connector: &Arc<ActiveConnector>,
        properties: &WebhookProperties,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
        evaluation_context: &Value,
    ) -> ConnectorResult<Outcome> {
        if !self.is_valid_hmac(connector, properties, raw_body, headers)? {
            return Ok(Outcome::Unauthorized);
        }
        if !self.activation_condition_met(connector, evaluation_context)? {
            return Ok(Outcome::Unactivated);
        }
        let variables = self.extract_variables(connector, evaluation_context)?;
        let instance = connector.context().correlate(variables).await?;
        Ok(Outcome::Executed(instance))
    }

    fn is_valid_hmac(
        &self,
        connector: &Arc<ActiveConnector>,
        properties: &WebhookProperties,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
    ) -> ConnectorResult<bool> {
        if !properties.should_validate_hmac {
            return Ok(true);
        }
        let header = properties.hmac_header.as_deref().ok_or_else(|| {
            ConnectorError::AuthenticationFailure("HMAC header is not configured".to_string())
        })?;
        let secret_ref = properties.hmac_secret.as_deref().ok_or_else(|| {
            ConnectorError::AuthenticationFailure("HMAC secret is not configured".to_string())
        })?;
        let secret = connector.context().resolve_secret_value(secret_ref)?;
        let algorithm = hmac::HmacAlgorithm::parse(
            properties.hmac_algorithm.as_deref().unwrap_or("sha256"),
        )?;
        hmac::is_request_valid(raw_body, headers, header, &secret, algorithm)
    }

    fn activation_condition_met(
        &self,
        connector: &Arc<ActiveConnector>,
        evaluation_context: &Value,
    ) -> ConnectorResult<bool> {
        let definition = connector.definition();
        let Some(condition) = definition
            .activation_condition
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        else {
            return Ok(true);
        };
        let result = self.expressions.evaluate(condition, evaluation_context)?;
        Ok(result == Value::Bool(true))
    }

    fn extract_variables(
        &self,
        connector: &Arc<ActiveConnector>,
        evaluation_context: &Value,
    ) -> ConnectorResult<Value> {
        let definition = connector.definition();
        if let Some(expression) = definition.result_expression.as_deref() {
            return self.expressions.evaluate(expression, evaluation_context);
        }
        if let Some(variable) = definition.result_variable.as_deref() {
            let mut wrapped = Map::new();
            wrapped.insert(variable.to_string(), evaluation_context.clone());
            return Ok(Value::Object(wrapped));
        }
        Ok(evaluation_context.clone())
    }
}

/// Parse the raw body into the evaluation context's `body` value.
///
/// URL-encoded forms become a flat string map (pairs without a value are
/// dropped); anything else is treated as a JSON object, an absent body as an
/// empty one.
fn parse_body(body: Option<&[u8]>, content_type: Option<&str>) -> RuntimeResult<Value> {
    let is_form = content_type
        .map(|t| {
            t.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case(CONTENT_TYPE_FORM_URLENCODED)
        })
        .unwrap_or(false);

    let Some(bytes) = body.filter(|b| !b.is_empty()) else {
        return Ok(json!({}));
    };

    if is_form {
        let text = String::from_utf8_lossy(bytes);
        let mut map = Map::new();
        for pair in text.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                map.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        return Ok(Value::Object(map));
    }

    let parsed: Value = serde_json::from_slice(bytes)
        .map_err(|e| RuntimeError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    if !parsed.is_object() {
        return Err(RuntimeError::BadRequest(
            "Webhook body must be a JSON object".to_string(),
        ));
    }
    Ok(parsed)
}
