// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Append-only, bounded event log (§4.G / §3 "ReconcileEvent"). Process-
//! local only — no cross-process durability is claimed or needed.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use fluxforge_types::{ReconcileEvent, Stage};

const STATE_ID_METADATA_KEY: &str = "state_id";

#[derive(Clone)]
pub struct Timeline {
    capacity: usize,
    events: Arc<RwLock<VecDeque<ReconcileEvent>>>,
}

impl Timeline {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(4096)))),
        }
    }

    /// Appends `event`, evicting the oldest entry first if the log is at
    /// capacity.
    pub fn record(&self, event: ReconcileEvent) {
        let mut events = self.events.write();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Convenience wrapper: records a stage transition for `reqID` tagged
    /// with the state id it concerns, matching the `metadata map` shape
    /// spec.md describes for lookup-by-`stateID`.
    pub fn record_stage(
        &self,
        req_id: impl Into<String>,
        stage: Stage,
        node_id: impl Into<String>,
        tenant_id: impl Into<String>,
        state_id: impl Into<String>,
    ) {
        let event = ReconcileEvent::new(req_id, stage, node_id, tenant_id)
            .with_metadata(STATE_ID_METADATA_KEY, state_id);
        self.record(event);
    }

    pub fn by_request_id(&self, req_id: &str) -> Vec<ReconcileEvent> {
        self.events.read().iter().filter(|e| e.req_id == req_id).cloned().collect()
    }

    pub fn by_state_id(&self, state_id: &str) -> Vec<ReconcileEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.metadata.get(STATE_ID_METADATA_KEY).map(String::as_str) == Some(state_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_log_evicts_oldest() {
        let timeline = Timeline::new(2);
        timeline.record_stage("r1", Stage::Queued, "n", "t", "s1");
        timeline.record_stage("r2", Stage::Queued, "n", "t", "s2");
        timeline.record_stage("r3", Stage::Queued, "n", "t", "s3");
        assert_eq!(timeline.len(), 2);
        assert!(timeline.by_request_id("r1").is_empty());
        assert_eq!(timeline.by_request_id("r3").len(), 1);
    }

    #[test]
    fn lookup_by_state_id() {
        let timeline = Timeline::new(10);
        timeline.record_stage("r1", Stage::Queued, "n", "t", "state-x");
        timeline.record_stage("r1", Stage::Finished, "n", "t", "state-x");
        assert_eq!(timeline.by_state_id("state-x").len(), 2);
        assert!(timeline.by_state_id("state-y").is_empty());
    }
}
