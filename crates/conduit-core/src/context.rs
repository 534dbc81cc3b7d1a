//! Connector context: the runtime surface handed to an executable.
//!
//! The context pairs a [`ConnectorDefinition`] with the collaborators a
//! running connector needs: correlation into the process engine, secret
//! resolution, health reporting and a cancellation hook. It is owned by the
//! registry entry for the connector and shared with the executable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::correlation::CorrelationPoint;
use crate::definition::{ConnectorDefinition, ConnectorIdentity, ProcessDefinitionKey};
use crate::error::{ConnectorError, ConnectorResult};

/// Health of an active connector, reported by the runtime and the executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum Health {
    Up,
    Down { reason: String },
    Unknown,
}

impl Health {
    pub fn down(err: &ConnectorError) -> Self {
        Health::Down {
            reason: err.to_string(),
        }
    }
}

/// Reference to a process instance started or continued by a correlation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstanceRef {
    pub process_instance_key: u64,
    pub bpmn_process_id: String,
    pub version: u32,
    pub process_definition_key: ProcessDefinitionKey,
}

/// A running process instance with its variables, used by polling connectors
/// for gap detection and backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    pub process_instance_key: u64,
    pub bpmn_process_id: String,
    pub version: u32,
    pub variables: Value,
}

/// Process-engine correlation: hands extracted variables to the engine to
/// start or continue a process instance.
#[async_trait]
pub trait CorrelationHandler: Send + Sync {
    async fn correlate(
        &self,
        point: &CorrelationPoint,
        variables: Value,
    ) -> ConnectorResult<ProcessInstanceRef>;
}

/// Secret resolution collaborator
pub trait SecretProvider: Send + Sync {
    fn get_secret(&self, name: &str) -> Option<String>;
}

/// Secret provider backed by a static map, for tests and embedded setups
#[derive(Debug, Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }
}

impl SecretProvider for StaticSecretProvider {
    fn get_secret(&self, name: &str) -> Option<String> {
        self.secrets.get(name).cloned()
    }
}

/// Secret provider reading from process environment variables
#[derive(Debug, Default)]
pub struct EnvSecretProvider;

impl SecretProvider for EnvSecretProvider {
    fn get_secret(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Prefix marking a property value as a secret reference
const SECRET_REFERENCE_PREFIX: &str = "secrets.";

/// Runtime context of one active connector.
pub struct ConnectorContext {
    definition: ConnectorDefinition,
    correlation: Arc<dyn CorrelationHandler>,
    secrets: Arc<dyn SecretProvider>,
    health: RwLock<Health>,
    cancellation: UnboundedSender<ConnectorIdentity>,
}

impl ConnectorContext {
    pub fn new(
        definition: ConnectorDefinition,
        correlation: Arc<dyn CorrelationHandler>,
        secrets: Arc<dyn SecretProvider>,
        cancellation: UnboundedSender<ConnectorIdentity>,
    ) -> Self {
        Self {
            definition,
            correlation,
            secrets,
            health: RwLock::new(Health::Unknown),
            cancellation,
        }
    }

    pub fn definition(&self) -> &ConnectorDefinition {
        &self.definition
    }

    /// Correlate extracted variables through the process engine, under this
    /// connector's correlation point.
    pub async fn correlate(&self, variables: Value) -> ConnectorResult<ProcessInstanceRef> {
        self.correlation
            .correlate(&self.definition.correlation_point, variables)
            .await
    }

    /// Resolve `secrets.NAME` references in the given properties.
    pub fn replace_secrets(
        &self,
        properties: &HashMap<String, String>,
    ) -> ConnectorResult<HashMap<String, String>> {
        let mut resolved = HashMap::with_capacity(properties.len());
        for (key, value) in properties {
            let value = self.resolve_secret_value(value)?;
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }

    /// Resolve a single property value, passing it through unchanged unless
    /// it is a secret reference.
    pub fn resolve_secret_value(&self, value: &str) -> ConnectorResult<String> {
        match value.strip_prefix(SECRET_REFERENCE_PREFIX) {
            None => Ok(value.to_string()),
            Some(name) => self.secrets.get_secret(name).ok_or_else(|| {
                ConnectorError::EvaluationFailure(format!("secret '{}' is not available", name))
            }),
        }
    }

    pub fn report_health(&self, health: Health) {
        debug!(element_id = %self.definition.element_id, ?health, "Connector health reported");
        // Poisoning only happens if a reporter panicked; keep the last value
        if let Ok(mut slot) = self.health.write() {
            *slot = health;
        }
    }

    pub fn health(&self) -> Health {
        self.health
            .read()
            .map(|h| h.clone())
            .unwrap_or(Health::Unknown)
    }

    /// Request deactivation of this connector, e.g. on a fatal internal error
    /// inside the executable. The request is queued and handled by the
    /// lifecycle manager; this never re-enters the registry synchronously.
    pub fn cancel(&self, reason: &str) {
        warn!(
            element_id = %self.definition.element_id,
            %reason,
            "Connector requested its own deactivation"
        );
        self.report_health(Health::Down {
            reason: reason.to_string(),
        });
        if self.cancellation.send(self.definition.identity()).is_err() {
            warn!("Cancellation queue is closed; deactivation request dropped");
        }
    }
}

impl std::fmt::Debug for ConnectorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorContext")
            .field("definition", &self.definition.identity())
            .field("health", &self.health())
            .finish()
    }
}
