//! Webhook context router: context path -> eligible connectors.
//!
//! The router keeps a derived index from webhook context path to the
//! connectors that should receive requests for it. The index is never
//! patched incrementally: any registry mutation marks it dirty and the next
//! lookup rebuilds it from scratch from a registry snapshot, then publishes
//! the new index atomically. Version override semantics: within one bpmn
//! process id the highest version declaring a context path wins, and a
//! newer deployed version that no longer declares the webhook disables the
//! path entirely instead of falling back to an older version.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use conduit_core::ConnectorIdentity;

use crate::registry::{ActiveConnector, ConnectorRegistry, WebhookSnapshot};

type RouteIndex = HashMap<String, Vec<ConnectorIdentity>>;

/// Derived index from context path to eligible active connectors
pub struct WebhookRouter {
    registry: Arc<ConnectorRegistry>,
    index: RwLock<Arc<RouteIndex>>,
    dirty: AtomicBool,
}

impl WebhookRouter {
    pub fn new(registry: Arc<ConnectorRegistry>) -> Self {
        Self {
            registry,
            index: RwLock::new(Arc::new(RouteIndex::new())),
            dirty: AtomicBool::new(true),
        }
    }

    /// Mark the index stale. Called after every registration or
    /// deregistration; the rebuild happens lazily on the next lookup.
    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Whether any connector is routable at the given context path
    pub fn contains(&self, context_path: &str) -> bool {
        self.current_index().contains_key(context_path)
    }

    /// All currently-routable connectors for the context path, in index
    /// order. Connectors deactivated since the last rebuild resolve to
    /// nothing and are skipped.
    pub fn lookup(&self, context_path: &str) -> Vec<Arc<ActiveConnector>> {
        self.current_index()
            .get(context_path)
            .map(|identities| {
                identities
                    .iter()
                    .filter_map(|id| self.registry.find(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn current_index(&self) -> Arc<RouteIndex> {
        if self.dirty.load(Ordering::Acquire) {
            self.rebuild();
        }
        self.index
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Rebuild the index from a registry snapshot and publish it with a
    /// single reference swap. The dirty flag is cleared before the snapshot
    /// is taken, so a mutation racing the rebuild re-marks the index stale.
    fn rebuild(&self) {
        self.dirty.store(false, Ordering::Release);
        let snapshot = self.registry.webhook_snapshot();
        let index = Self::build_index(&snapshot);
        debug!(paths = index.len(), "Webhook index rebuilt");
        let mut published = self.index.write().unwrap_or_else(|e| e.into_inner());
        *published = Arc::new(index);
    }

    fn build_index(snapshot: &WebhookSnapshot) -> RouteIndex {
        let mut index = RouteIndex::new();

        let mut bpmn_ids: Vec<&String> = snapshot.groups.keys().collect();
        bpmn_ids.sort();

        for bpmn_id in bpmn_ids {
            let entries = &snapshot.groups[bpmn_id];

            // Entries are sorted by version ascending: a newer version
            // declaring the same context path replaces the older one.
            let mut candidates_by_context: HashMap<&str, &crate::registry::WebhookEntry> =
                HashMap::new();
            let mut last_entry = None;
            for entry in entries {
                candidates_by_context.insert(entry.properties.context_path.as_str(), entry);
                last_entry = Some(entry);
            }

            // If a strictly newer version of this process is deployed and no
            // longer declares the webhook, the path is disabled rather than
            // falling back to the older declaration.
            if let Some(last) = last_entry {
                if let Some(latest) = snapshot.latest_versions.get(bpmn_id) {
                    if *latest > last.properties.version {
                        candidates_by_context.remove(last.properties.context_path.as_str());
                    }
                }
            }

            // Multiple processes may share one context path; all survivors
            // are kept as a fan-out list.
            let mut survivors: Vec<_> = candidates_by_context.into_values().collect();
            survivors.sort_by_key(|e| e.properties.version);
            for entry in survivors {
                index
                    .entry(entry.properties.context_path.clone())
                    .or_default()
                    .push(entry.identity.clone());
            }
        }

        index
    }
}
