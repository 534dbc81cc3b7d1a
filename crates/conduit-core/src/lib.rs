//!
//! Conduit Core - domain model and connector SDK for the Conduit inbound
//! connector runtime.
//!
//! This crate defines the immutable model (correlation points, connector
//! definitions), the executable capability set, the connector context handed
//! to running executables, and the collaborator interfaces the runtime is
//! wired against.

/// Correlation point model
pub mod correlation;

/// Connector definition model
pub mod definition;

/// Connector context and collaborator traits
pub mod context;

/// Executable capabilities and factory
pub mod executable;

/// Error module
pub mod error;

// Re-export key types
pub use context::{
    ConnectorContext, CorrelationHandler, EnvSecretProvider, Health, ProcessInstance,
    ProcessInstanceRef, SecretProvider, StaticSecretProvider,
};
pub use correlation::CorrelationPoint;
pub use definition::{
    ConnectorDefinition, ConnectorIdentity, ProcessDefinitionKey, ProcessDefinitionRef,
    WebhookProperties, PROPERTY_HMAC_ALGORITHM, PROPERTY_HMAC_HEADER, PROPERTY_HMAC_SECRET,
    PROPERTY_SHOULD_VALIDATE_HMAC,
};
pub use error::{ConnectorError, ConnectorResult};
pub use executable::{
    ConnectorFactory, InboundExecutable, PlainConnector, PollingConnector, ProcessInstanceSource,
    WebhookConnector,
};
