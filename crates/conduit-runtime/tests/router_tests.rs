//! Routing semantics of the webhook context router: version override,
//! disabled paths and fan-out across processes.


use std::sync::Arc;

use pretty_assertions::assert_eq;

use conduit_runtime::registry::ConnectorRegistry;
use conduit_runtime::router::WebhookRouter;

use test_fixtures::{active_webhook, init_test_tracing, process_ref, webhook_definition};

fn setup() -> (Arc<ConnectorRegistry>, WebhookRouter) {
    init_test_tracing();
    let registry = Arc::new(ConnectorRegistry::new());
    let router = WebhookRouter::new(registry.clone());
    (registry, router)
}

#[test]
fn highest_version_declaring_a_path_wins() {
    let (registry, router) = setup();

    let v1 = process_ref(1, "order-process", 1);
    let v2 = process_ref(2, "order-process", 2);
    registry.mark_registered(&v1);
    registry.mark_registered(&v2);
    registry.insert(active_webhook(webhook_definition(&v1, "start", "orders")));
    registry.insert(active_webhook(webhook_definition(&v2, "start", "orders")));
    router.invalidate();

    let routed = router.lookup("orders");
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].definition().version, 2);
    assert_eq!(routed[0].definition().process_definition_key, 2);
}

#[test]
fn versions_declaring_different_paths_each_stay_routable() {
    let (registry, router) = setup();

    let v1 = process_ref(1, "order-process", 1);
    let v2 = process_ref(2, "order-process", 2);
    registry.mark_registered(&v1);
    registry.mark_registered(&v2);
    registry.insert(active_webhook(webhook_definition(&v1, "start", "orders-old")));
    registry.insert(active_webhook(webhook_definition(&v2, "start", "orders-new")));
    router.invalidate();

    assert_eq!(router.lookup("orders-old").len(), 1);
    assert_eq!(router.lookup("orders-new").len(), 1);
}

#[test]
fn newer_version_without_the_webhook_disables_the_path() {
    let (registry, router) = setup();

    // v1 declares the webhook, v2 is deployed without it. The path must go
    // dark instead of falling back to v1.
    let v1 = process_ref(1, "order-process", 1);
    let v2 = process_ref(2, "order-process", 2);
    registry.mark_registered(&v1);
    registry.mark_registered(&v2);
    registry.insert(active_webhook(webhook_definition(&v1, "start", "orders")));
    router.invalidate();

    assert!(!router.contains("orders"));
    assert!(router.lookup("orders").is_empty());
}

#[test]
fn shared_context_path_fans_out_across_processes() {
    let (registry, router) = setup();

    let a = process_ref(1, "process-a", 1);
    let b = process_ref(2, "process-b", 1);
    registry.mark_registered(&a);
    registry.mark_registered(&b);
    registry.insert(active_webhook(webhook_definition(&a, "start", "shared")));
    registry.insert(active_webhook(webhook_definition(&b, "start", "shared")));
    router.invalidate();

    let mut bpmn_ids: Vec<String> = router
        .lookup("shared")
        .iter()
        .map(|c| c.definition().bpmn_process_id.clone())
        .collect();
    bpmn_ids.sort();
    assert_eq!(bpmn_ids, vec!["process-a".to_string(), "process-b".to_string()]);
}

#[test]
fn routing_is_independent_of_registration_order() {
    let (registry, router) = setup();

    // Newer version registered first.
    let v1 = process_ref(1, "order-process", 1);
    let v2 = process_ref(2, "order-process", 2);
    registry.mark_registered(&v2);
    registry.insert(active_webhook(webhook_definition(&v2, "start", "orders")));
    registry.mark_registered(&v1);
    registry.insert(active_webhook(webhook_definition(&v1, "start", "orders")));
    router.invalidate();

    let routed = router.lookup("orders");
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].definition().version, 2);
}

#[test]
fn deactivated_connectors_are_skipped_until_the_next_rebuild() {
    let (registry, router) = setup();

    let v1 = process_ref(1, "order-process", 1);
    registry.mark_registered(&v1);
    let connector = active_webhook(webhook_definition(&v1, "start", "orders"));
    registry.insert(connector.clone());
    router.invalidate();
    assert_eq!(router.lookup("orders").len(), 1);

    // Remove without invalidating: the stale index entry resolves to nothing.
    registry.remove(&connector.identity());
    assert!(router.lookup("orders").is_empty());

    router.invalidate();
    assert!(!router.contains("orders"));
}

#[test]
fn registered_version_without_active_connector_still_overrides() {
    let (registry, router) = setup();

    // v2 is registered and redeclares the webhook but its activation failed
    // and left no healthy entry behind; v3 drops the webhook entirely.
    let v1 = process_ref(1, "order-process", 1);
    let v3 = process_ref(3, "order-process", 3);
    registry.mark_registered(&v1);
    registry.mark_registered(&v3);
    registry.insert(active_webhook(webhook_definition(&v1, "start", "orders")));
    router.invalidate();

    assert!(!router.contains("orders"));
}
