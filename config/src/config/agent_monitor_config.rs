// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::utils::duration_secs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the Agent Monitor (§4.J).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentMonitorConfig {
    #[serde(with = "duration_secs")]
    pub scan_interval: Duration,
    #[serde(with = "duration_secs")]
    pub heartbeat_threshold: Duration,
}

impl Default for AgentMonitorConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(10),
            heartbeat_threshold: Duration::from_secs(30),
        }
    }
}
