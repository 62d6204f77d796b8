// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use fluxforge_types::{Agent, DesiredState};

/// The durable system-of-record every node reads desired state and agent
/// registrations from, and the monotonic epoch counters it fences writes
/// against (§4.H step 3, §4.M dual-epoch guard).
#[async_trait]
pub trait DurableEpochStore: Send + Sync {
    /// Atomically increments and returns the durable epoch for `resource`
    /// (e.g. a tenant id or `"global"`). Starts at 1 on first call.
    async fn increment_durable_epoch(&self, resource: &str) -> anyhow::Result<i64>;

    /// Reads the current durable epoch for `resource` without mutating it.
    /// Resources never written to read as epoch 0.
    async fn get_durable_epoch(&self, resource: &str) -> anyhow::Result<i64>;

    /// Inserts or replaces the stored record for an agent.
    async fn upsert_agent(&self, agent: Agent) -> anyhow::Result<()>;

    /// Lists known agents, optionally filtered to one tenant.
    async fn list_agents(&self, tenant_filter: Option<&str>) -> anyhow::Result<Vec<Agent>>;

    /// Lists desired states with the given status that this shard owns,
    /// per the `fnv32(nodeID) mod shardCount` filter used by the scheduler's
    /// reconciliation pass (§4.K, §4.M).
    async fn list_states_by_status(
        &self,
        status: &str,
        shard_index: u32,
        shard_count: u32,
    ) -> anyhow::Result<Vec<DesiredState>>;
}
