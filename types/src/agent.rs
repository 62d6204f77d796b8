// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
}

/// An agent as seen through the durable store collaborator (§3). Owned by
/// the store; the Agent Monitor (§4.J) only ever flips `status` to
/// `Offline` and persists the change via `UpsertAgent`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub node_id: String,
    pub tenant_id: String,
    pub status: AgentStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(node_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            node_id: node_id.into(),
            tenant_id: tenant_id.into(),
            status: AgentStatus::Online,
            last_heartbeat: now,
            updated_at: now,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        self.status != AgentStatus::Offline && now - self.last_heartbeat > threshold
    }

    pub fn mark_offline(&mut self, now: DateTime<Utc>) {
        self.status = AgentStatus::Offline;
        self.updated_at = now;
    }
}
