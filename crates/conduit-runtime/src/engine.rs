//! In-memory process engine client.
//!
//! Default [`CorrelationHandler`] used for development and tests: it accepts
//! every correlation and hands back a process instance reference with a
//! monotonically increasing key. Production deployments substitute a gateway
//! client behind the same trait.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use conduit_core::{ConnectorResult, CorrelationHandler, CorrelationPoint, ProcessInstanceRef};

/// Correlation handler that starts in-memory process instances
#[derive(Debug, Default)]
pub struct InMemoryProcessEngine {
    next_instance_key: AtomicU64,
}

impl InMemoryProcessEngine {
    pub fn new() -> Self {
        Self {
            next_instance_key: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl CorrelationHandler for InMemoryProcessEngine {
    async fn correlate(
        &self,
        point: &CorrelationPoint,
        variables: Value,
    ) -> ConnectorResult<ProcessInstanceRef> {
        let process_instance_key = self.next_instance_key.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = point.id(),
            process_instance_key,
            ?variables,
            "Correlated in-memory process instance"
        );
        Ok(ProcessInstanceRef {
            process_instance_key,
            bpmn_process_id: point.bpmn_process_id().to_string(),
            version: point.version(),
            process_definition_key: match point {
                CorrelationPoint::MessageStartEvent {
                    process_definition_key,
                    ..
                } => *process_definition_key,
                CorrelationPoint::WebhookContext {
                    process_definition_key,
                    ..
                } => *process_definition_key,
            },
        })
    }
}
