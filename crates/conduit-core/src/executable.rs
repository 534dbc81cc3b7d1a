//! Connector executables: the closed set of inbound capabilities.
//!
//! An executable is the live behavior behind a connector definition. The
//! runtime dispatches on the capability explicitly: a plain executable just
//! subscribes to something, a polling executable additionally receives a
//! backfill supplier, and a webhook executable is routed requests by the
//! webhook subsystem rather than listening itself.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{ConnectorContext, ProcessInstance};
use crate::error::ConnectorResult;

/// Lazily-evaluated supplier of already-running process instances with their
/// variables, handed to polling executables for gap detection.
#[async_trait]
pub trait ProcessInstanceSource: Send + Sync {
    async fn running_instances(&self) -> ConnectorResult<Vec<ProcessInstance>>;
}

/// An executable that manages its own external subscription
#[async_trait]
pub trait PlainConnector: Send + Sync {
    async fn activate(&self, context: Arc<ConnectorContext>) -> ConnectorResult<()>;
    async fn deactivate(&self) -> ConnectorResult<()>;
}

/// An executable that polls an external source and may backfill missed events
#[async_trait]
pub trait PollingConnector: Send + Sync {
    async fn activate(
        &self,
        context: Arc<ConnectorContext>,
        instances: Arc<dyn ProcessInstanceSource>,
    ) -> ConnectorResult<()>;
    async fn deactivate(&self) -> ConnectorResult<()>;
}

/// An executable reachable at a webhook context path. Activation validates
/// configuration; request handling is performed by the webhook subsystem.
#[async_trait]
pub trait WebhookConnector: Send + Sync {
    async fn activate(&self, context: Arc<ConnectorContext>) -> ConnectorResult<()>;
    async fn deactivate(&self) -> ConnectorResult<()>;
}

/// Closed set of executable capabilities
pub enum InboundExecutable {
    Plain(Box<dyn PlainConnector>),
    Polling(Box<dyn PollingConnector>),
    Webhook(Box<dyn WebhookConnector>),
}

impl InboundExecutable {
    /// Whether this executable is routed by the webhook subsystem
    pub fn is_webhook(&self) -> bool {
        matches!(self, InboundExecutable::Webhook(_))
    }

    /// Invoke the type-specific deactivation hook
    pub async fn deactivate(&self) -> ConnectorResult<()> {
        match self {
            InboundExecutable::Plain(c) => c.deactivate().await,
            InboundExecutable::Polling(c) => c.deactivate().await,
            InboundExecutable::Webhook(c) => c.deactivate().await,
        }
    }
}

impl std::fmt::Debug for InboundExecutable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            InboundExecutable::Plain(_) => "Plain",
            InboundExecutable::Polling(_) => "Polling",
            InboundExecutable::Webhook(_) => "Webhook",
        };
        f.debug_tuple("InboundExecutable").field(&kind).finish()
    }
}

/// Resolves a connector type to a fresh executable instance.
pub trait ConnectorFactory: Send + Sync {
    /// Fails with [`crate::ConnectorError::UnknownConnectorType`] if the type
    /// cannot be resolved.
    fn get_instance(&self, connector_type: &str) -> ConnectorResult<InboundExecutable>;
}
