//! Error types shared by the connector SDK and the runtime.

use thiserror::Error;

/// Connector error types
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// No executable is registered for the requested connector type
    #[error("Unknown connector type: {0}")]
    UnknownConnectorType(String),

    /// The executable requires a subsystem that is not enabled
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Process definition introspection failed
    #[error("Inspection failure: {0}")]
    InspectionFailure(String),

    /// The activation hook (or a step leading up to it) failed
    #[error("Activation failure: {0}")]
    ActivationFailure(String),

    /// The deactivation hook failed
    #[error("Deactivation failure: {0}")]
    DeactivationFailure(String),

    /// HMAC signature validation rejected the request
    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    /// Expression evaluation failed
    #[error("Evaluation failure: {0}")]
    EvaluationFailure(String),

    /// The process engine rejected the correlation
    #[error("Correlation failure: {0}")]
    CorrelationFailure(String),
}

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;
