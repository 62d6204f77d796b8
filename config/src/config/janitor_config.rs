// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::utils::duration_secs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the Lock Janitor (§4.I).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct JanitorConfig {
    #[serde(with = "duration_secs")]
    pub scan_interval: Duration,
    /// Glob the janitor scans (`fluxforge:lock:*`); keys ending in the
    /// auxiliary suffix below are skipped.
    pub lock_pattern: String,
    pub auxiliary_suffix: String,
    /// Grace period past `expires_at` before a lease is considered stale
    /// enough to force-release, compensating for coordinator TTL lag.
    #[serde(with = "duration_secs")]
    pub staleness_grace: Duration,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(5),
            lock_pattern: "fluxforge:lock:*".to_string(),
            auxiliary_suffix: ":epoch".to_string(),
            staleness_grace: Duration::from_secs(5),
        }
    }
}
