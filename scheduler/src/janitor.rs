// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lock Janitor (§4.I): periodically evicts stale and epoch-fenced leases
//! that the ephemeral coordinator's own TTL would otherwise keep alive for
//! too long.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fluxforge_config::JanitorConfig;
use fluxforge_coordinator::{DurableEpochStore, EphemeralCoordinator};
use fluxforge_types::LeaseMetadata;

pub struct LockJanitor {
    config: JanitorConfig,
    election_resource: String,
    ephemeral: Arc<dyn EphemeralCoordinator>,
    durable: Arc<dyn DurableEpochStore>,
}

impl LockJanitor {
    pub fn new(
        config: JanitorConfig,
        election_resource: impl Into<String>,
        ephemeral: Arc<dyn EphemeralCoordinator>,
        durable: Arc<dyn DurableEpochStore>,
    ) -> Self {
        Self {
            config,
            election_resource: election_resource.into(),
            ephemeral,
            durable,
        }
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.scan_interval) => {}
            }
            if let Err(e) = self.sweep_once().await {
                warn!(error = ?e, "lock janitor sweep failed");
            }
        }
    }

    /// One pass over every key matching the configured lock pattern,
    /// skipping auxiliary keys, force-releasing fenced or stale leases.
    pub async fn sweep_once(&self) -> anyhow::Result<usize> {
        let keys = self.ephemeral.scan_locks(&self.config.lock_pattern).await?;
        let durable_epoch = self.durable.get_durable_epoch(&self.election_resource).await?;
        let now_millis = chrono::Utc::now().timestamp_millis();
        let grace_millis = self.config.staleness_grace.as_millis() as i64;

        let mut evicted = 0usize;
        for key in keys {
            if key.ends_with(&self.config.auxiliary_suffix) {
                continue;
            }
            let Some(bytes) = self.ephemeral.get_lock_owner(&key).await? else {
                continue;
            };
            let Ok(meta) = LeaseMetadata::from_bytes(&bytes) else {
                debug!(key, "skipping lock with undecodable metadata");
                continue;
            };

            if meta.is_fenced(durable_epoch) {
                warn!(key, epoch = meta.epoch, durable_epoch, "force-releasing fenced lease");
                self.ephemeral.release_lease(&key, &bytes).await?;
                evicted += 1;
                continue;
            }

            if now_millis > meta.expires_at + grace_millis {
                warn!(key, expires_at = meta.expires_at, now_millis, "force-releasing stale lease");
                self.ephemeral.release_lease(&key, &bytes).await?;
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxforge_coordinator::memory::{InMemoryDurableStore, InMemoryEphemeralCoordinator};
    use std::time::Duration;

    fn meta(epoch: i64, expires_at: i64) -> LeaseMetadata {
        LeaseMetadata::new("node-a", epoch, "req", 0, expires_at)
    }

    #[tokio::test]
    async fn evicts_fenced_lease() {
        let ephemeral = Arc::new(InMemoryEphemeralCoordinator::new());
        let durable = Arc::new(InMemoryDurableStore::new());
        durable.increment_durable_epoch("leader_election").await.unwrap();
        durable.increment_durable_epoch("leader_election").await.unwrap();
        let stale_meta = meta(1, chrono::Utc::now().timestamp_millis() + 60_000);
        ephemeral
            .acquire_lease("fluxforge:lock:leader_election", stale_meta.to_bytes(), Duration::from_secs(60))
            .await
            .unwrap();

        let janitor = LockJanitor::new(JanitorConfig::default(), "leader_election", ephemeral.clone(), durable);
        let evicted = janitor.sweep_once().await.unwrap();
        assert_eq!(evicted, 1);
        assert!(ephemeral.get_lock_owner("fluxforge:lock:leader_election").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn skips_auxiliary_keys() {
        let ephemeral = Arc::new(InMemoryEphemeralCoordinator::new());
        let durable = Arc::new(InMemoryDurableStore::new());
        ephemeral
            .acquire_lease("fluxforge:lock:leader_election:epoch", b"aux".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let janitor = LockJanitor::new(JanitorConfig::default(), "leader_election", ephemeral.clone(), durable);
        let evicted = janitor.sweep_once().await.unwrap();
        assert_eq!(evicted, 0);
    }

    #[tokio::test]
    async fn evicts_stale_past_grace() {
        let ephemeral = Arc::new(InMemoryEphemeralCoordinator::new());
        let durable = Arc::new(InMemoryDurableStore::new());
        let already_expired = meta(1, chrono::Utc::now().timestamp_millis() - 60_000);
        ephemeral
            .acquire_lease("fluxforge:lock:leader_election", already_expired.to_bytes(), Duration::from_secs(60))
            .await
            .unwrap();
        let janitor = LockJanitor::new(JanitorConfig::default(), "leader_election", ephemeral.clone(), durable);
        let evicted = janitor.sweep_once().await.unwrap();
        assert_eq!(evicted, 1);
    }
}
