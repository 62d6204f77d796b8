// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stage a request passes through, as recorded in the Timeline (§4.G).
/// `QuarantineDrop`, `Requeued` and `Abandoned` are recorded for
/// observability even though they are not part of the admission taxonomy
/// proper (§7) — operators need to see *why* a task never finished.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Queued,
    Dispatch,
    Finished,
    Failed,
    QuarantineDrop,
    Requeued,
    Abandoned,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileEvent {
    pub req_id: String,
    pub stage: Stage,
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub tenant_id: String,
    pub metadata: HashMap<String, String>,
}

impl ReconcileEvent {
    pub fn new(
        req_id: impl Into<String>,
        stage: Stage,
        node_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            req_id: req_id.into(),
            stage,
            timestamp: Utc::now(),
            node_id: node_id.into(),
            tenant_id: tenant_id.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
