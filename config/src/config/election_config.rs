// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::utils::duration_secs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the Leader Elector (§4.H).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElectionConfig {
    /// Named resource the durable epoch counter is tracked under, and the
    /// suffix of the lock key (`fluxforge:lock:<resource>`).
    pub resource: String,
    #[serde(with = "duration_secs")]
    pub lease_ttl: Duration,
    /// Identity this process registers as `owner_pod` in `LeaseMetadata`.
    pub owner_id: String,
    /// Consecutive renew failures tolerated before stepping down.
    pub max_consecutive_renew_failures: u32,
    /// Upper bound for the exponential acquire/renew backoff.
    #[serde(with = "duration_secs")]
    pub max_backoff: Duration,
    /// Grace window given to a fresh context when releasing the lease on
    /// loop exit, even after the outer context was already cancelled.
    #[serde(with = "duration_secs")]
    pub release_timeout: Duration,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        let lease_ttl = Duration::from_secs(15);
        Self {
            resource: "leader_election".to_string(),
            lease_ttl,
            owner_id: "unassigned-owner".to_string(),
            max_consecutive_renew_failures: 3,
            max_backoff: lease_ttl * 10,
            release_timeout: Duration::from_secs(2),
        }
    }
}

impl ElectionConfig {
    /// Base loop cadence: `ttl/3`, per §4.H.
    pub fn base_interval(&self) -> Duration {
        self.lease_ttl / 3
    }

    pub fn lock_key(&self) -> String {
        format!("fluxforge:lock:{}", self.resource)
    }
}
