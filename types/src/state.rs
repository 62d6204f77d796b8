// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// A desired-state record as returned by `ListStatesByStatus` (§4.B). The
/// Scheduler submits one `ReconciliationTask` per state returned here during
/// rehydration on election (§4.K).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DesiredState {
    pub state_id: String,
    pub node_id: String,
    pub tenant_id: String,
    pub status: String,
}
