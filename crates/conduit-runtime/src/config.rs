//! Configuration for the Conduit runtime
//!
//! This module contains the configuration types and loading functionality.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

use crate::error::{RuntimeError, RuntimeResult};

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// Whether the webhook subsystem is enabled. When disabled, webhook
    /// connectors fail activation with a capability error.
    #[serde(default = "default_webhook_enabled")]
    pub webhook_enabled: bool,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_webhook_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    pub fn load() -> RuntimeResult<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var("SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.port = port;
            } else {
                warn!("Invalid SERVER_PORT value: {}", port);
            }
        }

        if let Ok(host) = env::var("SERVER_HOST") {
            if host.is_empty() {
                return Err(RuntimeError::ConfigError(
                    "SERVER_HOST must not be empty".to_string(),
                ));
            }
            config.bind_address = host;
        }

        if let Ok(enabled) = env::var("WEBHOOK_ENABLED") {
            config.webhook_enabled = enabled.to_lowercase() == "true" || enabled == "1";
        }

        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.log_level = log_level;
        }

        if !config.webhook_enabled {
            warn!("Webhook subsystem disabled - webhook connectors will fail activation");
        }

        Ok(config)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_host(),
            webhook_enabled: default_webhook_enabled(),
            log_level: default_log_level(),
        }
    }
}
