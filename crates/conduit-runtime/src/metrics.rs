//! Metrics for the connector runtime.
//!
//! Fire-and-forget counters keyed by connector type. The recorder is a
//! trait so tests can observe what was emitted; the default implementation
//! forwards to the `metrics` facade.

use metrics::increment_counter;
use tracing::trace;

/// Counter: connector activation lifecycle events
pub const METRIC_INBOUND_ACTIVATIONS: &str = "conduit_inbound_connector_activations";
/// Counter: webhook trigger processing events
pub const METRIC_INBOUND_TRIGGERS: &str = "conduit_inbound_connector_triggers";

pub const ACTION_ACTIVATED: &str = "activated";
pub const ACTION_ACTIVATION_FAILED: &str = "activation-failed";
pub const ACTION_DEACTIVATED: &str = "deactivated";
pub const ACTION_RECEIVED: &str = "received";
pub const ACTION_COMPLETED: &str = "completed";
pub const ACTION_FAILED: &str = "failed";

/// Fire-and-forget metrics sink
pub trait MetricsRecorder: Send + Sync {
    fn increase(&self, metric: &'static str, action: &'static str, connector_type: &str);
}

/// Default recorder forwarding to the `metrics` facade
#[derive(Debug, Default)]
pub struct RuntimeMetrics;

impl MetricsRecorder for RuntimeMetrics {
    fn increase(&self, metric: &'static str, action: &'static str, connector_type: &str) {
        trace!(metric, action, connector_type, "Metric increment");
        increment_counter!(
            metric,
            "action" => action.to_string(),
            "type" => connector_type.to_string()
        );
    }
}
