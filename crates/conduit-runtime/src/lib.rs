//!
//! Conduit Runtime - Inbound connector runtime for the Conduit Platform
//!
//! This module exports all the components of the connector runtime.

// External dependencies
use std::sync::Arc;

/// API module
pub mod api;

/// Configuration module
pub mod config;

/// Process engine module
pub mod engine;

/// Error module
pub mod error;

/// Expression evaluation module
pub mod expression;

/// Connector factory module
pub mod factory;

/// Process definition inspection module
pub mod inspector;

/// Lifecycle manager module
pub mod lifecycle;

/// Metrics module
pub mod metrics;

/// Connector registry module
pub mod registry;

/// Webhook router module
pub mod router;

/// Runtime module
pub mod runtime;

/// Webhook subsystem module
pub mod webhook;

// Re-export key types
pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use factory::{GenericWebhookConnector, StaticConnectorFactory, WEBHOOK_CONNECTOR_TYPE};
pub use lifecycle::LifecycleManager;
pub use registry::{ActiveConnectorQuery, ConnectorRegistry};
pub use router::WebhookRouter;
pub use runtime::ConnectorRuntime;
pub use webhook::{WebhookExecutor, WebhookResponse};

use conduit_core::{ConnectorFactory, CorrelationHandler, SecretProvider};

use crate::engine::InMemoryProcessEngine;
use crate::expression::{ExpressionEngine, SimpleExpressionEngine};
use crate::inspector::{
    InMemoryInspector, InMemorySearch, ProcessDefinitionInspector, ProcessDefinitionSearch,
};
use crate::metrics::{MetricsRecorder, RuntimeMetrics};

/// Run function
pub async fn run(config: RuntimeConfig) -> RuntimeResult<()> {
    // Initialize logging
    init_logging(&config);

    // Create runtime with default collaborators
    let runtime = create_runtime(config);

    // Drain executable-initiated cancellations into deactivations
    runtime.lifecycle().spawn_cancellation_worker();

    // Run server
    runtime.run().await
}

/// Initialize logging
pub fn init_logging(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    // Create filter based on config
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Initialize subscriber
    fmt().with_env_filter(filter).with_target(true).init();
}

/// Create a runtime wired with in-memory default collaborators: the built-in
/// connector factory, an empty inspector, and a process engine that assigns
/// instance keys locally.
pub fn create_runtime(config: RuntimeConfig) -> ConnectorRuntime {
    create_runtime_with(
        config,
        Arc::new(StaticConnectorFactory::with_defaults()),
        Arc::new(InMemoryInspector::new()),
        Arc::new(InMemorySearch::new()),
        Arc::new(InMemoryProcessEngine::new()),
        Arc::new(conduit_core::EnvSecretProvider),
    )
}

/// Create a runtime from explicit collaborators. Used by embedders that wire
/// their own process engine, inspector, or secret backend.
pub fn create_runtime_with(
    config: RuntimeConfig,
    factory: Arc<dyn ConnectorFactory>,
    inspector: Arc<dyn ProcessDefinitionInspector>,
    search: Arc<dyn ProcessDefinitionSearch>,
    correlation: Arc<dyn CorrelationHandler>,
    secrets: Arc<dyn SecretProvider>,
) -> ConnectorRuntime {
    let metrics: Arc<dyn MetricsRecorder> = Arc::new(RuntimeMetrics);
    let expressions: Arc<dyn ExpressionEngine> = Arc::new(SimpleExpressionEngine::new());

    let registry = Arc::new(ConnectorRegistry::new());
    let webhook_router = config
        .webhook_enabled
        .then(|| Arc::new(WebhookRouter::new(registry.clone())));

    let lifecycle = Arc::new(LifecycleManager::new(
        factory,
        inspector,
        search,
        correlation,
        secrets,
        metrics.clone(),
        registry.clone(),
        webhook_router.clone(),
    ));

    let webhook = webhook_router
        .map(|router| Arc::new(WebhookExecutor::new(router, expressions, metrics)));

    ConnectorRuntime::new(config, registry, lifecycle, webhook)
}
