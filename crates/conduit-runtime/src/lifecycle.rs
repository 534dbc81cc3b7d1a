//! Lifecycle manager: reconciles process definition changes against the
//! registry.
//!
//! Newly discovered process definitions are inspected for inbound connector
//! declarations and each declaration is activated; removed definitions have
//! their connectors deactivated. Every per-definition and per-connector
//! operation is isolated: one failure is logged and metered but never aborts
//! processing of siblings. Cancellation requests coming from a running
//! executable arrive over a queue and are handled by a worker task, so an
//! executable can never re-enter the registry synchronously.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, Instrument};

use conduit_core::{
    ConnectorContext, ConnectorDefinition, ConnectorError, ConnectorFactory, ConnectorIdentity,
    ConnectorResult, CorrelationHandler, Health, InboundExecutable, ProcessDefinitionKey,
    ProcessDefinitionRef, ProcessInstance, ProcessInstanceSource, SecretProvider,
};

use crate::inspector::{ProcessDefinitionInspector, ProcessDefinitionSearch};
use crate::metrics::{
    MetricsRecorder, ACTION_ACTIVATED, ACTION_ACTIVATION_FAILED, ACTION_DEACTIVATED,
    METRIC_INBOUND_ACTIVATIONS,
};
use crate::registry::{ActiveConnector, ConnectorRegistry};
use crate::router::WebhookRouter;

/// Backfill supplier bound to one process definition key; evaluated lazily
/// by the polling executable.
struct SearchInstanceSource {
    search: Arc<dyn ProcessDefinitionSearch>,
    process_definition_key: ProcessDefinitionKey,
}

#[async_trait]
impl ProcessInstanceSource for SearchInstanceSource {
    async fn running_instances(&self) -> ConnectorResult<Vec<ProcessInstance>> {
        self.search
            .fetch_process_instances_with_variables(self.process_definition_key)
            .await
    }
}

/// Reconciles process definition change events against the connector
/// registry.
pub struct LifecycleManager {
    factory: Arc<dyn ConnectorFactory>,
    inspector: Arc<dyn ProcessDefinitionInspector>,
    search: Arc<dyn ProcessDefinitionSearch>,
    correlation: Arc<dyn CorrelationHandler>,
    secrets: Arc<dyn SecretProvider>,
    metrics: Arc<dyn MetricsRecorder>,
    registry: Arc<ConnectorRegistry>,
    /// `None` means the webhook subsystem is disabled: webhook executables
    /// fail activation with a capability error.
    webhook_router: Option<Arc<WebhookRouter>>,
    cancellation_tx: UnboundedSender<ConnectorIdentity>,
    cancellation_rx: std::sync::Mutex<Option<UnboundedReceiver<ConnectorIdentity>>>,
}

impl LifecycleManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        factory: Arc<dyn ConnectorFactory>,
        inspector: Arc<dyn ProcessDefinitionInspector>,
        search: Arc<dyn ProcessDefinitionSearch>,
        correlation: Arc<dyn CorrelationHandler>,
        secrets: Arc<dyn SecretProvider>,
        metrics: Arc<dyn MetricsRecorder>,
        registry: Arc<ConnectorRegistry>,
        webhook_router: Option<Arc<WebhookRouter>>,
    ) -> Self {
        let (cancellation_tx, cancellation_rx) = mpsc::unbounded_channel();
        Self {
            factory,
            inspector,
            search,
            correlation,
            secrets,
            metrics,
            registry,
            webhook_router,
            cancellation_tx,
            cancellation_rx: std::sync::Mutex::new(Some(cancellation_rx)),
        }
    }

    /// Idempotency check: has this process definition already been
    /// inspected?
    pub fn is_registered(&self, key: ProcessDefinitionKey) -> bool {
        self.registry.is_registered(key)
    }

    /// Handle newly discovered process definitions: mark each registered,
    /// inspect it, and activate every declared connector. Inspection
    /// failures are isolated per definition.
    pub async fn handle_new_process_definitions(
        &self,
        definitions: HashSet<ProcessDefinitionRef>,
    ) {
        let mut to_activate = Vec::new();
        for definition in &definitions {
            self.registry.mark_registered(definition);
            self.invalidate_router();
            match self.inspector.find_inbound_connectors(definition).await {
                Ok(connectors) => to_activate.extend(connectors),
                Err(err) => {
                    error!(
                        process_definition_key = definition.key,
                        ?err,
                        "Failed to inspect process definition"
                    );
                }
            }
        }

        for connector in to_activate {
            self.activate_connector(connector).await;
        }
    }

    /// Handle removed process definitions: deactivate every connector
    /// registered under each removed key. Failures are isolated per
    /// connector.
    pub async fn handle_removed_process_definitions(
        &self,
        keys: HashSet<ProcessDefinitionKey>,
    ) {
        let to_deactivate: Vec<ConnectorIdentity> = keys
            .iter()
            .flat_map(|key| self.registry.connectors_for_key(*key))
            .map(|connector| connector.identity())
            .collect();

        for identity in to_deactivate {
            self.deactivate_connector(&identity).await;
        }
    }

    /// Activate one connector definition. Never propagates: failures leave a
    /// health-down registry entry behind and are metered.
    pub async fn activate_connector(&self, definition: ConnectorDefinition) {
        let span = info_span!(
            "activate_connector",
            connector_type = %definition.connector_type,
            element_id = %definition.element_id,
            process_definition_key = definition.process_definition_key,
        );
        async move {
            let connector_type = definition.connector_type.clone();
            let executable = match self.factory.get_instance(&connector_type) {
                Ok(executable) => executable,
                Err(err) => {
                    error!(?err, "Failed to instantiate connector");
                    self.metrics.increase(
                        METRIC_INBOUND_ACTIVATIONS,
                        ACTION_ACTIVATION_FAILED,
                        &connector_type,
                    );
                    return;
                }
            };

            let context = Arc::new(ConnectorContext::new(
                definition,
                self.correlation.clone(),
                self.secrets.clone(),
                self.cancellation_tx.clone(),
            ));
            let connector = Arc::new(ActiveConnector::new(executable, context.clone()));

            // Insert before invoking the activation hook: a crash during
            // activation still leaves a discoverable, deactivatable entry.
            if !self.registry.insert(connector.clone()) {
                return;
            }
            self.invalidate_router();

            match self.run_activation(&connector).await {
                Ok(()) => {
                    context.report_health(Health::Up);
                    self.metrics.increase(
                        METRIC_INBOUND_ACTIVATIONS,
                        ACTION_ACTIVATED,
                        &connector_type,
                    );
                    info!("Connector activated");
                }
                Err(err) => {
                    context.report_health(Health::down(&err));
                    error!(?err, "Failed to activate inbound connector");
                    self.metrics.increase(
                        METRIC_INBOUND_ACTIVATIONS,
                        ACTION_ACTIVATION_FAILED,
                        &connector_type,
                    );
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_activation(&self, connector: &Arc<ActiveConnector>) -> ConnectorResult<()> {
        let context = connector.context().clone();
        match connector.executable() {
            InboundExecutable::Webhook(executable) => {
                let Some(router) = &self.webhook_router else {
                    return Err(ConnectorError::CapabilityUnavailable(
                        "cannot activate webhook connector: webhook subsystem is disabled"
                            .to_string(),
                    ));
                };
                executable.activate(context).await?;
                // Routable only from this point: a failed activation leaves
                // the registry entry discoverable but never in the index.
                connector.mark_webhook_registered();
                router.invalidate();
                trace!("Registered webhook route");
                Ok(())
            }
            InboundExecutable::Polling(executable) => {
                let instances = Arc::new(SearchInstanceSource {
                    search: self.search.clone(),
                    process_definition_key: connector.definition().process_definition_key,
                });
                executable.activate(context, instances).await
            }
            InboundExecutable::Plain(executable) => executable.activate(context).await,
        }
    }

    /// Deactivate a connector by identity. Removal from the registry is the
    /// exactly-once guard: a second request for an already-removed connector
    /// is a no-op and emits no metric.
    pub async fn deactivate_connector(&self, identity: &ConnectorIdentity) {
        let Some(connector) = self.registry.remove(identity) else {
            debug!(?identity, "Connector already deactivated");
            return;
        };
        self.invalidate_router();
        if connector.executable().is_webhook() {
            trace!(?identity, "Deregistered webhook route");
        }
        if let Err(err) = connector.executable().deactivate().await {
            error!(?identity, ?err, "Failed to deactivate inbound connector");
        }
        self.metrics.increase(
            METRIC_INBOUND_ACTIVATIONS,
            ACTION_DEACTIVATED,
            &identity.connector_type,
        );
        info!(?identity, "Connector deactivated");
    }

    fn invalidate_router(&self) {
        if let Some(router) = &self.webhook_router {
            router.invalidate();
        }
    }

    /// Spawn the worker draining executable-initiated cancellation requests
    /// into deactivations. May be called once; later calls return `None`.
    pub fn spawn_cancellation_worker(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self
            .cancellation_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        let manager = self.clone();
        Some(tokio::spawn(async move {
            while let Some(identity) = rx.recv().await {
                manager.deactivate_connector(&identity).await;
            }
        }))
    }
}
