// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fluxforge_types::{owns_shard, Agent, DesiredState};
use parking_lot::Mutex;

use crate::durable::DurableEpochStore;
use crate::ephemeral::{EphemeralCoordinator, VersionedValue};

struct LeaseEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

struct VersionedEntry {
    value: Vec<u8>,
    version: u64,
    expires_at: Instant,
}

struct LockEntry {
    expires_at: Instant,
}

/// An in-process stand-in for an external lease/lock store. Used for local
/// single-node runs and exercised directly by `fluxforge-scheduler`'s test
/// suite; never durable, and cleared on process exit.
#[derive(Default)]
pub struct InMemoryEphemeralCoordinator {
    leases: Mutex<HashMap<String, LeaseEntry>>,
    versioned: Mutex<HashMap<String, VersionedEntry>>,
    locks: Mutex<HashMap<String, LockEntry>>,
}

impl InMemoryEphemeralCoordinator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EphemeralCoordinator for InMemoryEphemeralCoordinator {
    async fn acquire_lease(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<bool> {
        let mut leases = self.leases.lock();
        let now = Instant::now();
        if let Some(existing) = leases.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }
        leases.insert(
            key.to_string(),
            LeaseEntry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn renew_lease(&self, key: &str, expected_value: &[u8], ttl: Duration) -> anyhow::Result<bool> {
        let mut leases = self.leases.lock();
        let now = Instant::now();
        match leases.get_mut(key) {
            Some(entry) if entry.expires_at > now && entry.value == expected_value => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_lease(&self, key: &str, expected_value: &[u8]) -> anyhow::Result<()> {
        let mut leases = self.leases.lock();
        if let Some(entry) = leases.get(key) {
            if entry.value == expected_value {
                leases.remove(key);
            }
        }
        Ok(())
    }

    async fn get_lock_owner(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let leases = self.leases.lock();
        let now = Instant::now();
        Ok(leases
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn scan_locks(&self, pattern: &str) -> anyhow::Result<Vec<String>> {
        let now = Instant::now();
        let leases = self.leases.lock();
        let locks = self.locks.lock();
        let mut keys: Vec<String> = leases
            .iter()
            .filter(|(key, entry)| entry.expires_at > now && key.starts_with(pattern))
            .map(|(key, _)| key.clone())
            .collect();
        keys.extend(
            locks
                .iter()
                .filter(|(key, entry)| entry.expires_at > now && key.starts_with(pattern))
                .map(|(key, _)| key.clone()),
        );
        Ok(keys)
    }

    async fn get_versioned(&self, key: &str) -> anyhow::Result<Option<VersionedValue>> {
        let versioned = self.versioned.lock();
        let now = Instant::now();
        Ok(versioned
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| VersionedValue {
                value: entry.value.clone(),
                version: entry.version,
            }))
    }

    async fn set_versioned(&self, key: &str, value: Vec<u8>, version: u64, ttl: Duration) -> anyhow::Result<bool> {
        let mut versioned = self.versioned.lock();
        let now = Instant::now();
        let current_version = versioned
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.version);
        // CAS on version: reject unless strictly greater than whatever is
        // currently stored (or the key is absent/expired). Per spec.md
        // §4.M this is the primitive that makes recovery correct under a
        // concurrent writer racing the flusher — it does not require
        // contiguous version numbers, only monotonic progress.
        if let Some(current) = current_version {
            if version <= current {
                return Ok(false);
            }
        }
        versioned.insert(
            key.to_string(),
            VersionedEntry {
                value,
                version,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> anyhow::Result<bool> {
        let mut locks = self.locks.lock();
        let now = Instant::now();
        if let Some(existing) = locks.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }
        locks.insert(
            key.to_string(),
            LockEntry {
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release_lock(&self, key: &str) -> anyhow::Result<()> {
        self.locks.lock().remove(key);
        Ok(())
    }
}

/// An in-process stand-in for the durable system-of-record: epochs, agent
/// registrations and desired state, all kept in memory for local runs and
/// tests.
#[derive(Default)]
pub struct InMemoryDurableStore {
    epochs: Mutex<HashMap<String, i64>>,
    agents: Mutex<HashMap<String, Agent>>,
    states: Mutex<HashMap<String, DesiredState>>,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a desired state directly, bypassing any reconciliation path.
    /// Exists for test setup.
    pub fn seed_state(&self, state: DesiredState) {
        self.states.lock().insert(state.state_id.clone(), state);
    }
}

#[async_trait]
impl DurableEpochStore for InMemoryDurableStore {
    async fn increment_durable_epoch(&self, resource: &str) -> anyhow::Result<i64> {
        let mut epochs = self.epochs.lock();
        let next = epochs.get(resource).copied().unwrap_or(0) + 1;
        epochs.insert(resource.to_string(), next);
        Ok(next)
    }

    async fn get_durable_epoch(&self, resource: &str) -> anyhow::Result<i64> {
        Ok(self.epochs.lock().get(resource).copied().unwrap_or(0))
    }

    async fn upsert_agent(&self, agent: Agent) -> anyhow::Result<()> {
        self.agents.lock().insert(agent.node_id.clone(), agent);
        Ok(())
    }

    async fn list_agents(&self, tenant_filter: Option<&str>) -> anyhow::Result<Vec<Agent>> {
        let agents = self.agents.lock();
        Ok(agents
            .values()
            .filter(|agent| tenant_filter.map_or(true, |tenant| agent.tenant_id == tenant))
            .cloned()
            .collect())
    }

    async fn list_states_by_status(
        &self,
        status: &str,
        shard_index: u32,
        shard_count: u32,
    ) -> anyhow::Result<Vec<DesiredState>> {
        let states = self.states.lock();
        Ok(states
            .values()
            .filter(|state| state.status == status)
            .filter(|state| owns_shard(&state.node_id, shard_index, shard_count))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lease_acquire_blocks_until_expiry() {
        let coord = InMemoryEphemeralCoordinator::new();
        assert!(coord
            .acquire_lease("lock/a", b"node-1".to_vec(), Duration::from_millis(20))
            .await
            .unwrap());
        assert!(!coord
            .acquire_lease("lock/a", b"node-2".to_vec(), Duration::from_millis(20))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(coord
            .acquire_lease("lock/a", b"node-2".to_vec(), Duration::from_millis(20))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn renew_requires_matching_owner() {
        let coord = InMemoryEphemeralCoordinator::new();
        coord
            .acquire_lease("lock/b", b"node-1".to_vec(), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(!coord
            .renew_lease("lock/b", b"node-2", Duration::from_millis(50))
            .await
            .unwrap());
        assert!(coord
            .renew_lease("lock/b", b"node-1", Duration::from_millis(50))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn versioned_set_rejects_stale_version() {
        let coord = InMemoryEphemeralCoordinator::new();
        assert!(coord
            .set_versioned("state/x", b"v0".to_vec(), 0, Duration::from_secs(5))
            .await
            .unwrap());
        assert!(coord
            .set_versioned("state/x", b"v1".to_vec(), 1, Duration::from_secs(5))
            .await
            .unwrap());
        // stale: caller still thinks version is 0
        assert!(!coord
            .set_versioned("state/x", b"v1-stale".to_vec(), 1, Duration::from_secs(5))
            .await
            .unwrap());
        let current = coord.get_versioned("state/x").await.unwrap().unwrap();
        assert_eq!(current.value, b"v1");
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn durable_epoch_increments_monotonically() {
        let store = InMemoryDurableStore::new();
        assert_eq!(store.increment_durable_epoch("global").await.unwrap(), 1);
        assert_eq!(store.increment_durable_epoch("global").await.unwrap(), 2);
        assert_eq!(store.get_durable_epoch("global").await.unwrap(), 2);
        assert_eq!(store.get_durable_epoch("other").await.unwrap(), 0);
    }
}
