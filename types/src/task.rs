// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of scheduled reconciliation work.
///
/// `submit_time` is set exactly once, on first enqueue, and must never be
/// reset on requeue — aging (§4.C) is computed against the original
/// submission, not the most recent push. `enqueued_time` is updated on
/// every push and exists purely for backpressure telemetry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconciliationTask {
    pub request_id: String,
    pub node_id: String,
    pub tenant_id: String,
    /// 0 = most urgent, 10 = background.
    pub priority: u8,
    pub deadline: DateTime<Utc>,
    pub attempt_count: u32,
    pub failure_domain: Option<String>,
    pub state_id: String,
    pub submit_time: Option<DateTime<Utc>>,
    pub enqueued_time: DateTime<Utc>,
}

impl ReconciliationTask {
    /// Builds a task for first submission. `request_id` is generated if not
    /// supplied by the caller; `submit_time`/`enqueued_time` are left for the
    /// queue to stamp on first push (see `PriorityQueue::push`).
    pub fn new(
        node_id: impl Into<String>,
        tenant_id: impl Into<String>,
        state_id: impl Into<String>,
        priority: u8,
        deadline: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            request_id: Uuid::new_v4().to_string(),
            node_id: node_id.into(),
            tenant_id: tenant_id.into(),
            priority,
            deadline,
            attempt_count: 0,
            failure_domain: None,
            state_id: state_id.into(),
            submit_time: None,
            enqueued_time: now,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_failure_domain(mut self, domain: impl Into<String>) -> Self {
        self.failure_domain = Some(domain.into());
        self
    }
}
