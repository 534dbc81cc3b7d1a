//! Connector registry: process-wide table of active connectors.
//!
//! The registry owns every [`ActiveConnector`] instance. It tracks which
//! process definition keys have already been inspected (the idempotency
//! guard for the lifecycle manager) and a sorted set of deployed versions
//! per bpmn process id, which the webhook router needs for its
//! latest-version rule. Mutations are pure map operations under a lock;
//! activation and deactivation hooks run outside of it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

use conduit_core::{
    ConnectorContext, ConnectorDefinition, ConnectorIdentity, InboundExecutable,
    ProcessDefinitionKey, ProcessDefinitionRef, WebhookProperties,
};

/// A running connector: the executable paired with its context.
///
/// Owned exclusively by the registry; the webhook router only ever holds the
/// identity derived from the definition.
pub struct ActiveConnector {
    executable: InboundExecutable,
    context: Arc<ConnectorContext>,
    /// Set once the activation hook has succeeded. Entries inserted before
    /// or during a failing activation stay discoverable but never routable.
    webhook_registered: AtomicBool,
}

impl ActiveConnector {
    pub fn new(executable: InboundExecutable, context: Arc<ConnectorContext>) -> Self {
        Self {
            executable,
            context,
            webhook_registered: AtomicBool::new(false),
        }
    }

    /// Mark the webhook route live. Called by the lifecycle manager after a
    /// successful activation.
    pub fn mark_webhook_registered(&self) {
        self.webhook_registered.store(true, Ordering::Release);
    }

    pub fn is_webhook_registered(&self) -> bool {
        self.webhook_registered.load(Ordering::Acquire)
    }

    pub fn definition(&self) -> &ConnectorDefinition {
        self.context.definition()
    }

    pub fn identity(&self) -> ConnectorIdentity {
        self.definition().identity()
    }

    pub fn context(&self) -> &Arc<ConnectorContext> {
        &self.context
    }

    pub fn executable(&self) -> &InboundExecutable {
        &self.executable
    }

    /// Webhook routing properties, present only for webhook executables
    /// declaring a webhook correlation point.
    pub fn webhook_properties(&self) -> Option<WebhookProperties> {
        if !self.executable.is_webhook() {
            return None;
        }
        WebhookProperties::from_definition(self.definition())
    }
}

impl std::fmt::Debug for ActiveConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConnector")
            .field("identity", &self.identity())
            .field("executable", &self.executable)
            .finish()
    }
}

/// Filter for querying active connectors
#[derive(Debug, Clone, Default)]
pub struct ActiveConnectorQuery {
    pub bpmn_process_id: Option<String>,
    pub connector_type: Option<String>,
    pub element_id: Option<String>,
}

/// One webhook-capable connector as seen by the router rebuild
#[derive(Debug, Clone)]
pub struct WebhookEntry {
    pub identity: ConnectorIdentity,
    pub properties: WebhookProperties,
}

/// Consistent snapshot of the registry's webhook-relevant state
#[derive(Debug, Default)]
pub struct WebhookSnapshot {
    /// Webhook connectors grouped by bpmn process id, version ascending
    pub groups: HashMap<String, Vec<WebhookEntry>>,
    /// Highest registered (inspected) version per bpmn process id
    pub latest_versions: HashMap<String, u32>,
}

#[derive(Default)]
struct RegistryState {
    active_by_process_definition_key: HashMap<ProcessDefinitionKey, Vec<Arc<ActiveConnector>>>,
    registered_process_definition_keys: HashSet<ProcessDefinitionKey>,
    versions_by_bpmn_id: HashMap<String, BTreeSet<u32>>,
}

/// Process-wide table of active connectors
#[derive(Default)]
pub struct ConnectorRegistry {
    inner: RwLock<RegistryState>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark a process definition as inspected and record its version.
    pub fn mark_registered(&self, definition: &ProcessDefinitionRef) {
        let mut state = self.write();
        state.registered_process_definition_keys.insert(definition.key);
        state
            .versions_by_bpmn_id
            .entry(definition.bpmn_process_id.clone())
            .or_default()
            .insert(definition.version);
    }

    /// Idempotency check used before re-submitting a definition for
    /// inspection.
    pub fn is_registered(&self, key: ProcessDefinitionKey) -> bool {
        self.read().registered_process_definition_keys.contains(&key)
    }

    /// Insert a connector. Returns `false` (and leaves the registry
    /// unchanged) if a connector with an equal definition is already active.
    pub fn insert(&self, connector: Arc<ActiveConnector>) -> bool {
        let definition = connector.definition().clone();
        let mut state = self.write();
        if !state
            .registered_process_definition_keys
            .contains(&definition.process_definition_key)
        {
            warn!(
                process_definition_key = definition.process_definition_key,
                "Inserting connector for a process definition that was never marked registered"
            );
        }
        let entries = state
            .active_by_process_definition_key
            .entry(definition.process_definition_key)
            .or_default();
        if entries.iter().any(|c| *c.definition() == definition) {
            warn!(identity = ?definition.identity(), "Duplicate connector ignored");
            return false;
        }
        entries.push(connector);
        true
    }

    /// Remove a connector by identity. The second removal of the same
    /// connector is a no-op returning `None`.
    pub fn remove(&self, identity: &ConnectorIdentity) -> Option<Arc<ActiveConnector>> {
        let mut state = self.write();
        let entries = state
            .active_by_process_definition_key
            .get_mut(&identity.process_definition_key)?;
        let position = entries.iter().position(|c| c.identity() == *identity)?;
        let removed = entries.remove(position);
        if entries.is_empty() {
            state
                .active_by_process_definition_key
                .remove(&identity.process_definition_key);
        }
        Some(removed)
    }

    pub fn find(&self, identity: &ConnectorIdentity) -> Option<Arc<ActiveConnector>> {
        self.read()
            .active_by_process_definition_key
            .get(&identity.process_definition_key)?
            .iter()
            .find(|c| c.identity() == *identity)
            .cloned()
    }

    /// All connectors registered under a process definition key
    pub fn connectors_for_key(&self, key: ProcessDefinitionKey) -> Vec<Arc<ActiveConnector>> {
        self.read()
            .active_by_process_definition_key
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// Query active connectors by bpmn process id, connector type and
    /// element id. Absent filters match everything.
    pub fn query(&self, query: &ActiveConnectorQuery) -> Vec<Arc<ActiveConnector>> {
        self.read()
            .active_by_process_definition_key
            .values()
            .flatten()
            .filter(|c| {
                let d = c.definition();
                query
                    .bpmn_process_id
                    .as_ref()
                    .map(|id| *id == d.bpmn_process_id)
                    .unwrap_or(true)
                    && query
                        .connector_type
                        .as_ref()
                        .map(|t| *t == d.connector_type)
                        .unwrap_or(true)
                    && query
                        .element_id
                        .as_ref()
                        .map(|e| *e == d.element_id)
                        .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.read()
            .active_by_process_definition_key
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn registered_count(&self) -> usize {
        self.read().registered_process_definition_keys.len()
    }

    /// Consistent snapshot of routable webhook connectors and registered
    /// versions, taken under a single read lock. Only entries whose
    /// activation succeeded are included.
    pub fn webhook_snapshot(&self) -> WebhookSnapshot {
        let state = self.read();
        let mut groups: HashMap<String, Vec<WebhookEntry>> = HashMap::new();
        for connector in state.active_by_process_definition_key.values().flatten() {
            if !connector.is_webhook_registered() {
                continue;
            }
            if let Some(properties) = connector.webhook_properties() {
                groups
                    .entry(properties.bpmn_process_id.clone())
                    .or_default()
                    .push(WebhookEntry {
                        identity: connector.identity(),
                        properties,
                    });
            }
        }
        for entries in groups.values_mut() {
            entries.sort_by_key(|e| e.properties.version);
        }
        let latest_versions = state
            .versions_by_bpmn_id
            .iter()
            .filter_map(|(id, versions)| versions.last().map(|v| (id.clone(), *v)))
            .collect();
        WebhookSnapshot {
            groups,
            latest_versions,
        }
    }

    /// Forget all connectors and registrations. Useful in tests when the
    /// runtime needs a clean slate.
    pub fn reset(&self) {
        let mut state = self.write();
        *state = RegistryState::default();
    }
}
