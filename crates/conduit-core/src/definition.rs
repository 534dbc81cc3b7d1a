//! Connector definitions derived from process definition versions.
//!
//! A [`ConnectorDefinition`] describes one inbound trigger declared in one
//! version of a process definition. Definitions are created when a process
//! definition is inspected and are never mutated; a new version of the same
//! process produces new definitions that supersede the old ones.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationPoint;

/// Key of a deployed process definition version
pub type ProcessDefinitionKey = u64;

/// Reference to a deployed process definition, as supplied by the inbound
/// event source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinitionRef {
    pub key: ProcessDefinitionKey,
    pub bpmn_process_id: String,
    pub version: u32,
}

/// Identity of a connector within the registry: one trigger element in one
/// process definition version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorIdentity {
    pub process_definition_key: ProcessDefinitionKey,
    pub element_id: String,
    pub connector_type: String,
}

/// One declared inbound trigger in one process definition version.
///
/// Equality is structural over the identity triple (process definition key,
/// element id, connector type); the remaining fields are payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorDefinition {
    pub connector_type: String,
    pub process_definition_key: ProcessDefinitionKey,
    pub bpmn_process_id: String,
    pub version: u32,
    pub element_id: String,
    pub correlation_point: CorrelationPoint,
    /// Boolean expression gating correlation; absent means "always activate"
    pub activation_condition: Option<String>,
    /// Name to store the whole evaluation context under
    pub result_variable: Option<String>,
    /// Expression producing the variables to correlate
    pub result_expression: Option<String>,
    /// Raw connector properties (webhook HMAC settings live here)
    pub properties: HashMap<String, String>,
}

impl PartialEq for ConnectorDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.process_definition_key == other.process_definition_key
            && self.element_id == other.element_id
            && self.connector_type == other.connector_type
    }
}

impl Eq for ConnectorDefinition {}

impl Hash for ConnectorDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.process_definition_key.hash(state);
        self.element_id.hash(state);
        self.connector_type.hash(state);
    }
}

impl ConnectorDefinition {
    /// The identity triple used for registry membership and router keys
    pub fn identity(&self) -> ConnectorIdentity {
        ConnectorIdentity {
            process_definition_key: self.process_definition_key,
            element_id: self.element_id.clone(),
            connector_type: self.connector_type.clone(),
        }
    }
}

/// Property key: whether HMAC validation is enabled (`enabled`/`disabled`)
pub const PROPERTY_SHOULD_VALIDATE_HMAC: &str = "inbound.shouldValidateHmac";
/// Property key: secret used to compute the HMAC signature
pub const PROPERTY_HMAC_SECRET: &str = "inbound.hmacSecret";
/// Property key: request header carrying the signature
pub const PROPERTY_HMAC_HEADER: &str = "inbound.hmacHeader";
/// Property key: signature algorithm (`sha1`, `sha256`, `sha512`)
pub const PROPERTY_HMAC_ALGORITHM: &str = "inbound.hmacAlgorithm";

/// Typed view over a webhook connector definition
#[derive(Debug, Clone)]
pub struct WebhookProperties {
    pub context_path: String,
    pub bpmn_process_id: String,
    pub version: u32,
    pub should_validate_hmac: bool,
    pub hmac_secret: Option<String>,
    pub hmac_header: Option<String>,
    pub hmac_algorithm: Option<String>,
}

impl WebhookProperties {
    /// Derive webhook properties from a definition, if it declares a webhook
    /// correlation point.
    pub fn from_definition(definition: &ConnectorDefinition) -> Option<Self> {
        let CorrelationPoint::WebhookContext { context_path, .. } = &definition.correlation_point
        else {
            return None;
        };
        let should_validate_hmac = definition
            .properties
            .get(PROPERTY_SHOULD_VALIDATE_HMAC)
            .map(|v| v != "disabled")
            .unwrap_or(false);
        Some(WebhookProperties {
            context_path: context_path.clone(),
            bpmn_process_id: definition.bpmn_process_id.clone(),
            version: definition.version,
            should_validate_hmac,
            hmac_secret: definition.properties.get(PROPERTY_HMAC_SECRET).cloned(),
            hmac_header: definition.properties.get(PROPERTY_HMAC_HEADER).cloned(),
            hmac_algorithm: definition.properties.get(PROPERTY_HMAC_ALGORITHM).cloned(),
        })
    }

    /// Stable identifier used to key per-connector outcomes in responses and
    /// logs.
    pub fn connector_identifier(&self) -> String {
        format!(
            "webhook-{}-{}-{}",
            self.context_path, self.bpmn_process_id, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn definition(key: ProcessDefinitionKey, element_id: &str, version: u32) -> ConnectorDefinition {
        ConnectorDefinition {
            connector_type: "conduit.webhook:1".to_string(),
            process_definition_key: key,
            bpmn_process_id: "order-process".to_string(),
            version,
            element_id: element_id.to_string(),
            correlation_point: CorrelationPoint::WebhookContext {
                context_path: "orders".to_string(),
                bpmn_process_id: "order-process".to_string(),
                version,
                process_definition_key: key,
            },
            activation_condition: None,
            result_variable: None,
            result_expression: None,
            properties: HashMap::new(),
        }
    }

    #[test]
    fn equality_is_structural_over_identity_triple() {
        let a = definition(1, "start", 1);
        let mut b = definition(1, "start", 1);
        b.activation_condition = Some("true".to_string());
        assert_eq!(a, b);
        assert_ne!(a, definition(2, "start", 1));
        assert_ne!(a, definition(1, "other", 1));
    }

    #[test]
    fn webhook_properties_carry_the_context_path() {
        let def = definition(7, "start", 3);
        let props = WebhookProperties::from_definition(&def).unwrap();
        assert_eq!(props.context_path, "orders");
        assert!(!props.should_validate_hmac);
        assert_eq!(props.connector_identifier(), "webhook-orders-order-process-3");
    }

    #[test]
    fn hmac_defaults_to_disabled_unless_enabled() {
        let mut def = definition(7, "start", 3);
        def.properties.insert(
            PROPERTY_SHOULD_VALIDATE_HMAC.to_string(),
            "enabled".to_string(),
        );
        let props = WebhookProperties::from_definition(&def).unwrap();
        assert!(props.should_validate_hmac);
    }
}
