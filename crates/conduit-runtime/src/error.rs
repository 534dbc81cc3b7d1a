//! Error types for the Conduit runtime
//!
//! This module contains the error types used throughout the runtime.

use conduit_core::ConnectorError;
use thiserror::Error;

/// Runtime error types
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed inbound request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connector-level error
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Internal runtime error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::InternalError(format!("IO error: {}", err))
    }
}
