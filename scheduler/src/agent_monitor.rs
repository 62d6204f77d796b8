// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Agent Monitor (§4.J): marks agents offline once their heartbeat goes
//! stale, and publishes a simple connected-agent count.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fluxforge_config::AgentMonitorConfig;
use fluxforge_coordinator::DurableEpochStore;
use fluxforge_types::AgentStatus;

pub struct AgentMonitor {
    config: AgentMonitorConfig,
    durable: Arc<dyn DurableEpochStore>,
    connected: AtomicUsize,
}

impl AgentMonitor {
    pub fn new(config: AgentMonitorConfig, durable: Arc<dyn DurableEpochStore>) -> Self {
        Self {
            config,
            durable,
            connected: AtomicUsize::new(0),
        }
    }

    pub fn connected_agents(&self) -> usize {
        self.connected.load(Ordering::Relaxed)
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.scan_interval) => {}
            }
            if let Err(e) = self.sweep_once().await {
                warn!(error = ?e, "agent monitor sweep failed");
            }
        }
    }

    /// One pass: lists every agent, flips any non-offline agent whose
    /// heartbeat is older than the threshold to offline, and republishes
    /// the connected-agent gauge.
    pub async fn sweep_once(&self) -> anyhow::Result<usize> {
        let now = chrono::Utc::now();
        let threshold = chrono::Duration::from_std(self.config.heartbeat_threshold).unwrap_or(chrono::Duration::seconds(30));
        let agents = self.durable.list_agents(None).await?;

        let mut marked_offline = 0usize;
        let mut connected = 0usize;
        for mut agent in agents {
            if agent.is_stale(now, threshold) {
                warn!(node_id = %agent.node_id, last_heartbeat = %agent.last_heartbeat, "marking agent offline");
                agent.mark_offline(now);
                self.durable.upsert_agent(agent).await?;
                marked_offline += 1;
            } else {
                if agent.status != AgentStatus::Offline {
                    connected += 1;
                }
                debug!(node_id = %agent.node_id, "agent heartbeat within threshold");
            }
        }

        self.connected.store(connected, Ordering::Relaxed);
        if marked_offline > 0 {
            info!(marked_offline, connected, "agent monitor sweep complete");
        }
        Ok(marked_offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxforge_coordinator::memory::InMemoryDurableStore;
    use fluxforge_types::Agent;
    use std::time::Duration;

    #[tokio::test]
    async fn marks_stale_agent_offline() {
        let durable = Arc::new(InMemoryDurableStore::new());
        let mut agent = Agent::new("node-a", "tenant-a");
        agent.last_heartbeat = chrono::Utc::now() - chrono::Duration::minutes(5);
        durable.upsert_agent(agent).await.unwrap();

        let monitor = AgentMonitor::new(
            AgentMonitorConfig {
                scan_interval: Duration::from_secs(10),
                heartbeat_threshold: Duration::from_secs(30),
            },
            durable.clone(),
        );
        let marked = monitor.sweep_once().await.unwrap();
        assert_eq!(marked, 1);
        let agents = durable.list_agents(None).await.unwrap();
        assert_eq!(agents[0].status, AgentStatus::Offline);
        assert_eq!(monitor.connected_agents(), 0);
    }

    #[tokio::test]
    async fn healthy_agent_counts_as_connected() {
        let durable = Arc::new(InMemoryDurableStore::new());
        durable.upsert_agent(Agent::new("node-a", "tenant-a")).await.unwrap();
        let monitor = AgentMonitor::new(AgentMonitorConfig::default(), durable);
        monitor.sweep_once().await.unwrap();
        assert_eq!(monitor.connected_agents(), 1);
    }
}
