// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::utils::duration_secs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the admission circuit breaker (§4.F).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    pub queue_depth_threshold: usize,
    pub saturation_threshold: f64,
    #[serde(with = "duration_secs")]
    pub cooldown: Duration,
    /// Requests admitted as probes while `HalfOpen`.
    pub test_limit: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            queue_depth_threshold: 500,
            saturation_threshold: 0.95,
            cooldown: Duration::from_secs(30),
            test_limit: 5,
        }
    }
}

impl CircuitBreakerConfig {
    /// `HalfOpen -> Closed` requires queue depth under this half-threshold.
    pub fn half_open_queue_depth_threshold(&self) -> usize {
        self.queue_depth_threshold / 2
    }
}
