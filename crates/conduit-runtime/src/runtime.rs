//! Main Conduit runtime implementation
//!
//! This module contains the ConnectorRuntime implementation: the assembled
//! registry, lifecycle manager and webhook subsystem behind the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::api::admin::ConnectorSummary;
use crate::config::RuntimeConfig;
use crate::error::RuntimeResult;
use crate::lifecycle::LifecycleManager;
use crate::registry::{ActiveConnectorQuery, ConnectorRegistry};
use crate::webhook::WebhookExecutor;

/// Assembled runtime
#[derive(Clone)]
pub struct ConnectorRuntime {
    /// Configuration
    pub config: RuntimeConfig,

    /// Connector registry
    registry: Arc<ConnectorRegistry>,

    /// Lifecycle manager
    lifecycle: Arc<LifecycleManager>,

    /// Webhook correlation engine, absent when the webhook subsystem is
    /// disabled
    webhook: Option<Arc<WebhookExecutor>>,
}

impl ConnectorRuntime {
    pub fn new(
        config: RuntimeConfig,
        registry: Arc<ConnectorRegistry>,
        lifecycle: Arc<LifecycleManager>,
        webhook: Option<Arc<WebhookExecutor>>,
    ) -> Self {
        Self {
            config,
            registry,
            lifecycle,
            webhook,
        }
    }

    /// The lifecycle manager, driven by the inbound event source
    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    pub fn registry(&self) -> &Arc<ConnectorRegistry> {
        &self.registry
    }

    /// The webhook engine, if the subsystem is enabled
    pub fn webhook_executor(&self) -> Option<&Arc<WebhookExecutor>> {
        self.webhook.as_ref()
    }

    /// Query active connectors for the admin API
    pub fn active_connectors(&self, query: &ActiveConnectorQuery) -> Vec<ConnectorSummary> {
        self.registry
            .query(query)
            .into_iter()
            .map(|connector| {
                let definition = connector.definition();
                ConnectorSummary {
                    connector_type: definition.connector_type.clone(),
                    process_definition_key: definition.process_definition_key,
                    bpmn_process_id: definition.bpmn_process_id.clone(),
                    version: definition.version,
                    element_id: definition.element_id.clone(),
                    health: connector.context().health(),
                }
            })
            .collect()
    }

    /// Run the runtime's HTTP server
    pub async fn run(self) -> RuntimeResult<()> {
        info!("Starting Conduit connector runtime");

        let addr = SocketAddr::new(self.config.bind_address.parse().map_err(|e| {
            crate::error::RuntimeError::ConfigError(format!("Invalid bind address: {}", e))
        })?, self.config.port);

        let app = crate::api::build_router(Arc::new(self));

        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("Listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(crate::error::RuntimeError::from)?;

        Ok(())
    }
}
