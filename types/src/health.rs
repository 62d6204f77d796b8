// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which signal an `UpdateNodeHealth` call is setting (§4.E).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthSignal {
    Agent,
    Observed,
    External,
    Registration,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Normal,
    Canary,
}

/// Composite per-node health used to drive quarantine and the circuit
/// breaker's canary bypass.
///
/// `composite = 0.2*agent + 0.5*observed + 0.3*external`; `quarantined`
/// whenever `composite < 0.4`. Hysteresis is deliberately unspecified by
/// spec.md: transitions happen the instant the composite crosses 0.4 in
/// either direction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeHealth {
    pub node_id: String,
    pub agent_reported: f64,
    pub observed: f64,
    pub external_probe: f64,
    pub tier: Tier,
    pub last_seen: DateTime<Utc>,
}

pub const QUARANTINE_THRESHOLD: f64 = 0.4;

impl NodeHealth {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            agent_reported: 1.0,
            observed: 1.0,
            external_probe: 1.0,
            tier: Tier::Normal,
            last_seen: Utc::now(),
        }
    }

    pub fn composite(&self) -> f64 {
        0.2 * self.agent_reported + 0.5 * self.observed + 0.3 * self.external_probe
    }

    pub fn quarantined(&self) -> bool {
        self.composite() < QUARANTINE_THRESHOLD
    }

    pub fn is_canary(&self) -> bool {
        matches!(self.tier, Tier::Canary)
    }

    /// Applies one named signal and refreshes `last_seen`. `Registration`
    /// only touches `tier`/`last_seen` — it exists so a node can announce
    /// itself (and get a rate limiter allocated) before any score arrives.
    pub fn apply_signal(&mut self, signal: HealthSignal, score: f64, tier: Option<Tier>) {
        match signal {
            HealthSignal::Agent => self.agent_reported = score,
            HealthSignal::Observed => self.observed = score,
            HealthSignal::External => self.external_probe = score,
            HealthSignal::Registration => {}
        }
        if let Some(tier) = tier {
            self.tier = tier;
        }
        self.last_seen = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_is_weighted_blend() {
        let mut h = NodeHealth::new("n1");
        h.apply_signal(HealthSignal::External, 0.0, None);
        // 0.2*1.0 + 0.5*1.0 + 0.3*0.0 = 0.7
        assert!((h.composite() - 0.7).abs() < 1e-9);
        assert!(!h.quarantined());
    }

    #[test]
    fn low_external_alone_can_still_avoid_quarantine() {
        let mut h = NodeHealth::new("n1");
        h.apply_signal(HealthSignal::Observed, 0.0, None);
        h.apply_signal(HealthSignal::External, 0.0, None);
        // 0.2*1.0 + 0.5*0.0 + 0.3*0.0 = 0.2 < 0.4
        assert!(h.quarantined());
    }
}
