//! Lifecycle manager behavior: activation, deactivation, failure isolation
//! and executable-initiated cancellation.


use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use conduit_core::{
    ConnectorDefinition, ConnectorError, ConnectorResult, Health, InboundExecutable,
    ProcessDefinitionRef, ProcessInstance, StaticSecretProvider,
};
use conduit_runtime::engine::InMemoryProcessEngine;
use conduit_runtime::inspector::{InMemoryInspector, InMemorySearch, ProcessDefinitionInspector};
use conduit_runtime::metrics::{
    ACTION_ACTIVATED, ACTION_ACTIVATION_FAILED, ACTION_DEACTIVATED, METRIC_INBOUND_ACTIVATIONS,
};
use conduit_runtime::registry::ConnectorRegistry;
use conduit_runtime::router::WebhookRouter;
use conduit_runtime::LifecycleManager;

use test_fixtures::{
    init_test_tracing, plain_definition, polling_definition, process_ref, test_factory,
    webhook_definition, CapturingMetrics, HookCounters, TestPollingConnector, TEST_FAILING_TYPE,
    TEST_POLLING_TYPE,
};

struct Harness {
    lifecycle: Arc<LifecycleManager>,
    registry: Arc<ConnectorRegistry>,
    router: Arc<WebhookRouter>,
    inspector: Arc<InMemoryInspector>,
    metrics: Arc<CapturingMetrics>,
    counters: Arc<HookCounters>,
}

fn harness() -> Harness {
    harness_with_webhooks(true)
}

fn harness_with_webhooks(webhooks_enabled: bool) -> Harness {
    init_test_tracing();
    let counters = Arc::new(HookCounters::default());
    let metrics = Arc::new(CapturingMetrics::default());
    let inspector = Arc::new(InMemoryInspector::new());
    let registry = Arc::new(ConnectorRegistry::new());
    let router = Arc::new(WebhookRouter::new(registry.clone()));
    let lifecycle = Arc::new(LifecycleManager::new(
        Arc::new(test_factory(counters.clone())),
        inspector.clone(),
        Arc::new(InMemorySearch::new()),
        Arc::new(InMemoryProcessEngine::new()),
        Arc::new(StaticSecretProvider::default()),
        metrics.clone(),
        registry.clone(),
        webhooks_enabled.then(|| router.clone()),
    ));
    Harness {
        lifecycle,
        registry,
        router,
        inspector,
        metrics,
        counters,
    }
}

#[tokio::test]
async fn new_process_definitions_activate_their_connectors() {
    let h = harness();
    let v1 = process_ref(1, "order-process", 1);
    h.inspector.put(
        1,
        vec![
            webhook_definition(&v1, "hook", "orders"),
            plain_definition(&v1, "listener"),
        ],
    );

    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;

    assert!(h.lifecycle.is_registered(1));
    assert_eq!(h.registry.active_count(), 2);
    assert_eq!(h.counters.activations(), 2);
    assert_eq!(
        h.metrics.count(METRIC_INBOUND_ACTIVATIONS, ACTION_ACTIVATED),
        2
    );
    assert_eq!(h.router.lookup("orders").len(), 1);
}

#[tokio::test]
async fn unknown_connector_type_does_not_abort_siblings() {
    let h = harness();
    let v1 = process_ref(1, "order-process", 1);
    let mut unknown = plain_definition(&v1, "bad");
    unknown.connector_type = "nobody.knows:1".to_string();
    h.inspector.put(
        1,
        vec![unknown, webhook_definition(&v1, "hook", "orders")],
    );

    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;

    // The unknown type leaves no registry entry; the sibling still comes up.
    assert_eq!(h.registry.active_count(), 1);
    assert_eq!(
        h.metrics
            .count(METRIC_INBOUND_ACTIVATIONS, ACTION_ACTIVATION_FAILED),
        1
    );
    assert_eq!(
        h.metrics.count(METRIC_INBOUND_ACTIVATIONS, ACTION_ACTIVATED),
        1
    );
}

#[tokio::test]
async fn failed_activation_leaves_a_health_down_entry() {
    let h = harness();
    let v1 = process_ref(1, "order-process", 1);
    let mut failing = webhook_definition(&v1, "hook", "orders");
    failing.connector_type = TEST_FAILING_TYPE.to_string();
    h.inspector.put(1, vec![failing.clone()]);

    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;

    // Inserted before the hook ran, so the failed connector stays
    // discoverable and deactivatable.
    let connector = h.registry.find(&failing.identity()).unwrap();
    assert!(matches!(connector.context().health(), Health::Down { .. }));
    assert_eq!(
        h.metrics
            .count(METRIC_INBOUND_ACTIVATIONS, ACTION_ACTIVATION_FAILED),
        1
    );

    h.lifecycle.deactivate_connector(&failing.identity()).await;
    assert_eq!(h.registry.active_count(), 0);
}

#[tokio::test]
async fn failed_activation_is_not_routable() {
    let h = harness();
    let v1 = process_ref(1, "order-process", 1);
    let mut failing = webhook_definition(&v1, "hook", "orders");
    failing.connector_type = TEST_FAILING_TYPE.to_string();
    h.inspector.put(1, vec![failing]);

    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;

    // The health-down entry stays in the registry but must never be handed
    // live requests.
    assert_eq!(h.registry.active_count(), 1);
    assert!(!h.router.contains("orders"));
    assert!(h.router.lookup("orders").is_empty());
}

#[tokio::test]
async fn webhook_activation_fails_when_subsystem_is_disabled() {
    let h = harness_with_webhooks(false);
    let v1 = process_ref(1, "order-process", 1);
    let definition = webhook_definition(&v1, "hook", "orders");
    h.inspector.put(1, vec![definition.clone()]);

    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;

    let connector = h.registry.find(&definition.identity()).unwrap();
    assert!(matches!(connector.context().health(), Health::Down { .. }));
    assert_eq!(
        h.metrics
            .count(METRIC_INBOUND_ACTIVATIONS, ACTION_ACTIVATION_FAILED),
        1
    );
    assert_eq!(h.counters.activations(), 0);
}

#[tokio::test]
async fn inspection_failure_is_isolated_per_definition() {
    struct FlakyInspector {
        healthy: InMemoryInspector,
        failing_key: u64,
    }

    #[async_trait]
    impl ProcessDefinitionInspector for FlakyInspector {
        async fn find_inbound_connectors(
            &self,
            definition: &ProcessDefinitionRef,
        ) -> ConnectorResult<Vec<ConnectorDefinition>> {
            if definition.key == self.failing_key {
                return Err(ConnectorError::InspectionFailure(
                    "model cannot be parsed".to_string(),
                ));
            }
            self.healthy.find_inbound_connectors(definition).await
        }
    }

    init_test_tracing();
    let counters = Arc::new(HookCounters::default());
    let metrics = Arc::new(CapturingMetrics::default());
    let healthy = InMemoryInspector::new();
    let good = process_ref(2, "good-process", 1);
    healthy.put(2, vec![webhook_definition(&good, "hook", "good")]);
    let registry = Arc::new(ConnectorRegistry::new());
    let router = Arc::new(WebhookRouter::new(registry.clone()));
    let lifecycle = Arc::new(LifecycleManager::new(
        Arc::new(test_factory(counters.clone())),
        Arc::new(FlakyInspector {
            healthy,
            failing_key: 1,
        }),
        Arc::new(InMemorySearch::new()),
        Arc::new(InMemoryProcessEngine::new()),
        Arc::new(StaticSecretProvider::default()),
        metrics,
        registry.clone(),
        Some(router),
    ));

    lifecycle
        .handle_new_process_definitions(HashSet::from([
            process_ref(1, "bad-process", 1),
            good,
        ]))
        .await;

    // Both keys are marked registered; only the inspectable one activates.
    assert!(lifecycle.is_registered(1));
    assert!(lifecycle.is_registered(2));
    assert_eq!(registry.active_count(), 1);
    assert_eq!(counters.activations(), 1);
}

#[tokio::test]
async fn polling_activation_receives_running_instances() {
    init_test_tracing();
    let counters = Arc::new(HookCounters::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut factory = test_factory(counters.clone());
    let polling_counters = counters.clone();
    let sink = seen.clone();
    factory.register(TEST_POLLING_TYPE, move || {
        InboundExecutable::Polling(Box::new(TestPollingConnector {
            counters: polling_counters.clone(),
            seen_instances: sink.clone(),
        }))
    });

    let inspector = Arc::new(InMemoryInspector::new());
    let v1 = process_ref(1, "order-process", 1);
    inspector.put(1, vec![polling_definition(&v1, "poller")]);

    let search = Arc::new(InMemorySearch::new());
    search.put(
        1,
        vec![ProcessInstance {
            process_instance_key: 99,
            bpmn_process_id: "order-process".to_string(),
            version: 1,
            variables: json!({ "orderId": 42 }),
        }],
    );

    let registry = Arc::new(ConnectorRegistry::new());
    let router = Arc::new(WebhookRouter::new(registry.clone()));
    let lifecycle = Arc::new(LifecycleManager::new(
        Arc::new(factory),
        inspector,
        search,
        Arc::new(InMemoryProcessEngine::new()),
        Arc::new(StaticSecretProvider::default()),
        Arc::new(CapturingMetrics::default()),
        registry.clone(),
        Some(router),
    ));

    lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;

    // The supplier hands the executable the instances seeded for its own
    // process definition key.
    assert_eq!(registry.active_count(), 1);
    assert_eq!(counters.activations(), 1);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].process_instance_key, 99);
    assert_eq!(seen[0].bpmn_process_id, "order-process");
    assert_eq!(seen[0].variables, json!({ "orderId": 42 }));
}

#[tokio::test]
async fn removed_process_definitions_deactivate_all_their_connectors() {
    let h = harness();
    let v1 = process_ref(1, "order-process", 1);
    h.inspector.put(
        1,
        vec![
            webhook_definition(&v1, "hook", "orders"),
            plain_definition(&v1, "listener"),
        ],
    );
    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;
    assert_eq!(h.registry.active_count(), 2);

    h.lifecycle
        .handle_removed_process_definitions(HashSet::from([1]))
        .await;

    assert_eq!(h.registry.active_count(), 0);
    assert_eq!(h.counters.deactivations(), 2);
    assert_eq!(
        h.metrics.count(METRIC_INBOUND_ACTIVATIONS, ACTION_DEACTIVATED),
        2
    );
    assert!(!h.router.contains("orders"));
}

#[tokio::test]
async fn deactivation_is_exactly_once() {
    let h = harness();
    let v1 = process_ref(1, "order-process", 1);
    let definition = webhook_definition(&v1, "hook", "orders");
    h.inspector.put(1, vec![definition.clone()]);
    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;

    h.lifecycle.deactivate_connector(&definition.identity()).await;
    h.lifecycle.deactivate_connector(&definition.identity()).await;

    assert_eq!(h.counters.deactivations(), 1);
    assert_eq!(
        h.metrics.count(METRIC_INBOUND_ACTIVATIONS, ACTION_DEACTIVATED),
        1
    );
}

#[tokio::test]
async fn duplicate_definition_set_is_idempotent() {
    let h = harness();
    let v1 = process_ref(1, "order-process", 1);
    h.inspector
        .put(1, vec![webhook_definition(&v1, "hook", "orders")]);

    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1.clone()]))
        .await;
    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;

    // The duplicate insert is rejected; only the first activation counts.
    assert_eq!(h.registry.active_count(), 1);
    assert_eq!(h.counters.activations(), 1);
}

#[tokio::test]
async fn cancellation_requests_are_drained_into_deactivations() {
    let h = harness();
    let v1 = process_ref(1, "order-process", 1);
    let definition = webhook_definition(&v1, "hook", "orders");
    h.inspector.put(1, vec![definition.clone()]);
    h.lifecycle
        .handle_new_process_definitions(HashSet::from([v1]))
        .await;

    let worker = h.lifecycle.spawn_cancellation_worker().unwrap();
    // The worker receiver can be claimed only once.
    assert!(h.lifecycle.spawn_cancellation_worker().is_none());

    let connector = h.registry.find(&definition.identity()).unwrap();
    connector.context().cancel("subscription lost");

    // Drained asynchronously; poll until the worker has processed it.
    for _ in 0..50 {
        if h.registry.active_count() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(h.registry.active_count(), 0);
    assert_eq!(h.counters.deactivations(), 1);
    worker.abort();
}
