//! Process definition inspection collaborators.
//!
//! The runtime does not parse process models itself; it is wired against an
//! inspector that extracts inbound connector declarations from a deployed
//! process definition, and a search service that supplies running process
//! instances for polling backfill.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use conduit_core::{
    ConnectorDefinition, ConnectorResult, ProcessDefinitionKey, ProcessDefinitionRef,
    ProcessInstance,
};

/// Extracts inbound connector declarations from one process definition
/// version.
#[async_trait]
pub trait ProcessDefinitionInspector: Send + Sync {
    async fn find_inbound_connectors(
        &self,
        definition: &ProcessDefinitionRef,
    ) -> ConnectorResult<Vec<ConnectorDefinition>>;
}

/// Query service over the process engine's historical/runtime state
#[async_trait]
pub trait ProcessDefinitionSearch: Send + Sync {
    async fn fetch_process_instances_with_variables(
        &self,
        process_definition_key: ProcessDefinitionKey,
    ) -> ConnectorResult<Vec<ProcessInstance>>;
}

/// In-memory inspector backed by a key-indexed map of declarations.
///
/// Used for development and testing, and by embedders that discover
/// connector declarations out of band and feed them in directly.
#[derive(Debug, Default)]
pub struct InMemoryInspector {
    declarations: RwLock<HashMap<ProcessDefinitionKey, Vec<ConnectorDefinition>>>,
}

impl InMemoryInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the connector declarations for one process definition key.
    pub fn put(&self, key: ProcessDefinitionKey, connectors: Vec<ConnectorDefinition>) {
        self.declarations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, connectors);
    }
}

#[async_trait]
impl ProcessDefinitionInspector for InMemoryInspector {
    async fn find_inbound_connectors(
        &self,
        definition: &ProcessDefinitionRef,
    ) -> ConnectorResult<Vec<ConnectorDefinition>> {
        Ok(self
            .declarations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&definition.key)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory search service; reports no running instances unless seeded.
#[derive(Debug, Default)]
pub struct InMemorySearch {
    instances: RwLock<HashMap<ProcessDefinitionKey, Vec<ProcessInstance>>>,
}

impl InMemorySearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: ProcessDefinitionKey, instances: Vec<ProcessInstance>) {
        self.instances
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, instances);
    }
}

#[async_trait]
impl ProcessDefinitionSearch for InMemorySearch {
    async fn fetch_process_instances_with_variables(
        &self,
        process_definition_key: ProcessDefinitionKey,
    ) -> ConnectorResult<Vec<ProcessInstance>> {
        Ok(self
            .instances
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&process_definition_key)
            .cloned()
            .unwrap_or_default())
    }
}
