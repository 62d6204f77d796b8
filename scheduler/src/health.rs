// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Node Health Registry (§4.E): composite health score per node, driving
//! quarantine and the circuit breaker's canary bypass.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use fluxforge_types::{HealthSignal, NodeHealth, Tier};

use crate::rate_limiter::KeyedRateLimiter;

/// Registry of per-node health, backed by a single read-write lock (§5:
/// "Access is serialized under the scheduler's lock" — this is that lock,
/// scoped to health state alone rather than the whole scheduler, so the
/// registry remains independently testable).
#[derive(Clone)]
pub struct HealthRegistry {
    nodes: Arc<RwLock<HashMap<String, NodeHealth>>>,
    node_limiter: Arc<KeyedRateLimiter>,
}

impl HealthRegistry {
    pub fn new(node_limiter: Arc<KeyedRateLimiter>) -> Self {
        Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
            node_limiter,
        }
    }

    /// Applies one named signal to `node_id`, creating the entry (and its
    /// rate limiter bucket) on first contact. Recomputes `composite` and
    /// `quarantined` as a side effect of reading the updated entry.
    pub fn update(&self, node_id: &str, signal: HealthSignal, score: f64, tier: Option<Tier>) {
        self.node_limiter.ensure(node_id);
        let mut nodes = self.nodes.write();
        let entry = nodes
            .entry(node_id.to_string())
            .or_insert_with(|| NodeHealth::new(node_id));
        let was_quarantined = entry.quarantined();
        entry.apply_signal(signal, score, tier);
        if entry.quarantined() != was_quarantined {
            info!(
                node_id,
                quarantined = entry.quarantined(),
                composite = entry.composite(),
                "node quarantine state changed"
            );
        }
    }

    pub fn get(&self, node_id: &str) -> Option<NodeHealth> {
        self.nodes.read().get(node_id).cloned()
    }

    /// `true` if the node is known and currently quarantined. An unknown
    /// node (never reported health) is treated as healthy — it simply has
    /// no signal yet, which is not the same as a bad one.
    pub fn is_quarantined(&self, node_id: &str) -> bool {
        self.nodes.read().get(node_id).map(|h| h.quarantined()).unwrap_or(false)
    }

    pub fn is_canary(&self, node_id: &str) -> bool {
        self.nodes.read().get(node_id).map(|h| h.is_canary()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HealthRegistry {
        HealthRegistry::new(Arc::new(KeyedRateLimiter::new(5.0, 1)))
    }

    #[test]
    fn unknown_node_is_not_quarantined() {
        assert!(!registry().is_quarantined("unknown"));
    }

    #[test]
    fn low_external_probe_quarantines() {
        let reg = registry();
        reg.update("node-a", HealthSignal::External, 0.0, None);
        reg.update("node-a", HealthSignal::Observed, 0.0, None);
        assert!(reg.is_quarantined("node-a"));
    }

    #[test]
    fn registration_sets_tier_and_seeds_limiter() {
        let reg = registry();
        reg.update("node-a", HealthSignal::Registration, 0.0, Some(Tier::Canary));
        assert!(reg.is_canary("node-a"));
        assert!(!reg.is_quarantined("node-a"));
    }
}
