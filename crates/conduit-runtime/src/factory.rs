//! Connector factory: resolves connector types to executable instances.
//!
//! The runtime ships a generic webhook connector and lets embedders register
//! additional types. Every activation gets a fresh executable instance so
//! connectors can hold per-activation state without sharing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use conduit_core::{
    ConnectorContext, ConnectorError, ConnectorFactory, ConnectorResult, InboundExecutable,
    WebhookConnector, WebhookProperties,
};

/// Connector type of the built-in generic webhook connector
pub const WEBHOOK_CONNECTOR_TYPE: &str = "conduit.webhook:1";

type Constructor = Box<dyn Fn() -> InboundExecutable + Send + Sync>;

/// Factory over a fixed set of registered connector constructors
#[derive(Default)]
pub struct StaticConnectorFactory {
    constructors: HashMap<String, Constructor>,
}

impl StaticConnectorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory pre-loaded with the built-in connector types
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register(WEBHOOK_CONNECTOR_TYPE, || {
            InboundExecutable::Webhook(Box::new(GenericWebhookConnector::new()))
        });
        factory
    }

    /// Register a constructor for a connector type, replacing any previous
    /// registration.
    pub fn register<F>(&mut self, connector_type: &str, constructor: F)
    where
        F: Fn() -> InboundExecutable + Send + Sync + 'static,
    {
        self.constructors
            .insert(connector_type.to_string(), Box::new(constructor));
    }
}

impl ConnectorFactory for StaticConnectorFactory {
    fn get_instance(&self, connector_type: &str) -> ConnectorResult<InboundExecutable> {
        let constructor = self.constructors.get(connector_type).ok_or_else(|| {
            ConnectorError::UnknownConnectorType(format!(
                "no connector registered for type '{}'",
                connector_type
            ))
        })?;
        debug!(connector_type, "Instantiating connector");
        Ok(constructor())
    }
}

impl std::fmt::Debug for StaticConnectorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticConnectorFactory")
            .field("types", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Built-in webhook connector.
///
/// Activation validates the declaration; request handling, authentication
/// and correlation are performed by the webhook subsystem.
#[derive(Debug, Default)]
pub struct GenericWebhookConnector;

impl GenericWebhookConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WebhookConnector for GenericWebhookConnector {
    async fn activate(&self, context: Arc<ConnectorContext>) -> ConnectorResult<()> {
        let properties =
            WebhookProperties::from_definition(context.definition()).ok_or_else(|| {
                ConnectorError::ActivationFailure(
                    "webhook connector declared without a webhook correlation point".to_string(),
                )
            })?;
        if properties.context_path.is_empty() {
            return Err(ConnectorError::ActivationFailure(
                "webhook context path must not be empty".to_string(),
            ));
        }
        if properties.should_validate_hmac {
            // Resolve eagerly so a missing secret fails activation instead of
            // every request.
            let secret = properties.hmac_secret.as_deref().ok_or_else(|| {
                ConnectorError::ActivationFailure(
                    "HMAC validation enabled but no secret configured".to_string(),
                )
            })?;
            context.resolve_secret_value(secret).map_err(|err| {
                ConnectorError::ActivationFailure(format!(
                    "HMAC secret cannot be resolved: {}",
                    err
                ))
            })?;
        }
        debug!(
            context_path = %properties.context_path,
            "Webhook connector ready"
        );
        Ok(())
    }

    async fn deactivate(&self) -> ConnectorResult<()> {
        Ok(())
    }
}
