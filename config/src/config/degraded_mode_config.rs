// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::utils::duration_secs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning shared by the Degraded Mode cache (§4.L) and the Reconciliation
/// Coordinator (§4.M).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DegradedModeConfig {
    pub local_cache_capacity: usize,
    pub pending_writes_capacity: usize,
    /// Default TTL used when a caller doesn't supply one for a write.
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
    #[serde(with = "duration_secs")]
    pub reconciliation_interval: Duration,
    /// A pending write older than this is dropped as too stale rather than
    /// flushed (§4.M step 5).
    #[serde(with = "duration_secs")]
    pub max_pending_age: Duration,
    /// When `true`, the Reconciliation Coordinator acquires
    /// `reconciliation-global-lock` instead of relying purely on the
    /// dual-epoch guard (§4.M, "An alternative mode").
    pub use_reconciliation_lock: bool,
    pub reconciliation_lock_key: String,
    #[serde(with = "duration_secs")]
    pub reconciliation_lock_ttl: Duration,
}

impl Default for DegradedModeConfig {
    fn default() -> Self {
        Self {
            local_cache_capacity: 10_000,
            pending_writes_capacity: 10_000,
            default_ttl: Duration::from_secs(300),
            reconciliation_interval: Duration::from_secs(10),
            max_pending_age: Duration::from_secs(5 * 60),
            use_reconciliation_lock: false,
            reconciliation_lock_key: "reconciliation-global-lock".to_string(),
            reconciliation_lock_ttl: Duration::from_secs(5 * 60),
        }
    }
}
