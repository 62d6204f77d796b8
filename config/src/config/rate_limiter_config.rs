// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::utils::duration_secs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token bucket defaults for the node and tenant rate limiters (§4.D).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimiterConfig {
    pub node_rps: f64,
    pub node_burst: u32,
    pub tenant_rps: f64,
    pub tenant_burst: u32,
    /// Minimum penalty applied when a tenant reservation is denied, even if
    /// the bucket would refill sooner (§4.K dispatch step 5).
    #[serde(with = "duration_secs")]
    pub tenant_min_penalty: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            node_rps: 5.0,
            node_burst: 1,
            tenant_rps: 50.0,
            tenant_burst: 10,
            tenant_min_penalty: Duration::from_secs(5),
        }
    }
}
