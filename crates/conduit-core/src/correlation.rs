//! Correlation points: the identity a connector listens under.
//!
//! A correlation point describes what kind of inbound event a connector is
//! waiting for (a named message, a webhook context path) together with the
//! process version it belongs to. Points are immutable once constructed.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::definition::ProcessDefinitionKey;

/// The identity a connector listens under, matched against inbound events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CorrelationPoint {
    /// A message start event, correlated by message name
    #[serde(rename_all = "camelCase")]
    MessageStartEvent {
        message_name: String,
        message_id_expression: Option<String>,
        bpmn_process_id: String,
        version: u32,
        process_definition_key: ProcessDefinitionKey,
    },
    /// A webhook trigger, correlated by externally addressable context path
    #[serde(rename_all = "camelCase")]
    WebhookContext {
        context_path: String,
        bpmn_process_id: String,
        version: u32,
        process_definition_key: ProcessDefinitionKey,
    },
}

impl CorrelationPoint {
    /// Natural key of the point: the message name or context path.
    pub fn id(&self) -> &str {
        match self {
            CorrelationPoint::MessageStartEvent { message_name, .. } => message_name,
            CorrelationPoint::WebhookContext { context_path, .. } => context_path,
        }
    }

    /// The bpmn process id the point belongs to
    pub fn bpmn_process_id(&self) -> &str {
        match self {
            CorrelationPoint::MessageStartEvent { bpmn_process_id, .. } => bpmn_process_id,
            CorrelationPoint::WebhookContext { bpmn_process_id, .. } => bpmn_process_id,
        }
    }

    /// The process definition version the point belongs to
    pub fn version(&self) -> u32 {
        match self {
            CorrelationPoint::MessageStartEvent { version, .. } => *version,
            CorrelationPoint::WebhookContext { version, .. } => *version,
        }
    }

    /// Deterministic ordering used for conflict resolution.
    ///
    /// Identical variants compare by their natural key. Differing variants
    /// are incomparable and treated as `Greater`, so this is deliberately not
    /// an `Ord` impl.
    pub fn compare(&self, other: &CorrelationPoint) -> Ordering {
        match (self, other) {
            (
                CorrelationPoint::MessageStartEvent { message_name: a, .. },
                CorrelationPoint::MessageStartEvent { message_name: b, .. },
            ) => a.cmp(b),
            (
                CorrelationPoint::WebhookContext { context_path: a, .. },
                CorrelationPoint::WebhookContext { context_path: b, .. },
            ) => a.cmp(b),
            _ => Ordering::Greater,
        }
    }
}
