// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

mod agent_monitor_config;
mod circuit_breaker_config;
mod degraded_mode_config;
mod election_config;
mod janitor_config;
mod logger_config;
mod rate_limiter_config;
mod scheduler_config;

pub use agent_monitor_config::AgentMonitorConfig;
pub use circuit_breaker_config::CircuitBreakerConfig;
pub use degraded_mode_config::DegradedModeConfig;
pub use election_config::ElectionConfig;
pub use janitor_config::JanitorConfig;
pub use logger_config::{Level, LoggerConfig, CHANNEL_SIZE};
pub use rate_limiter_config::RateLimiterConfig;
pub use scheduler_config::SchedulerConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The full configuration for one FluxForge node, mirroring the teacher's
/// `NodeConfig` aggregate-of-sub-configs pattern: one struct per component,
/// combined here, every field defaulted so a bare `NodeConfig::default()` is
/// enough to run locally.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub node_id: String,
    pub logger: LoggerConfig,
    pub election: ElectionConfig,
    pub scheduler: SchedulerConfig,
    pub rate_limiter: RateLimiterConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub janitor: JanitorConfig,
    pub agent_monitor: AgentMonitorConfig,
    pub degraded_mode: DegradedModeConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "fluxforge-node".to_string(),
            logger: LoggerConfig::default(),
            election: ElectionConfig::default(),
            scheduler: SchedulerConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            janitor: JanitorConfig::default(),
            agent_monitor: AgentMonitorConfig::default(),
            degraded_mode: DegradedModeConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut config: NodeConfig = serde_yaml::from_str(&contents)?;
        if config.election.owner_id == "unassigned-owner" {
            config.election.owner_id = config.node_id.clone();
        }
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = serde_yaml::to_string(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_yaml() {
        let config = NodeConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let decoded: NodeConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, decoded);
    }

    #[test]
    fn load_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.yaml");
        std::fs::write(&path, "node_id: test\nbogus_field: true\n").unwrap();
        assert!(NodeConfig::load(&path).is_err());
    }
}
