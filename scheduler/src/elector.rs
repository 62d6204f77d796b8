// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Leader Elector (§4.H) — the critical algorithm. A single background loop
//! alternates acquire/renew against the ephemeral coordinator, fencing every
//! acquisition with an epoch burned from the durable store *before* the
//! lease attempt, so even losing attempts advance the cluster-wide fencing
//! token.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use fluxforge_config::ElectionConfig;
use fluxforge_coordinator::{
    fencing::new_fenced_context, DurableEpochStore, EphemeralCoordinator, FencedContext, FencingHandle,
};
use fluxforge_types::LeaseMetadata;

/// Emitted exactly once per leadership transition. Subscribers (the
/// scheduler, the reconciliation coordinator) use this to learn the new
/// fenced context or to react to a step-down.
#[derive(Clone, Debug)]
pub enum ElectionEvent {
    Elected(FencedContext),
    Lost,
}

struct Inner {
    is_leader: bool,
    current_value: Option<Vec<u8>>,
    current_epoch: i64,
    last_epoch_seen: i64,
    consecutive_renew_failures: u32,
    fencing_handle: Option<FencingHandle>,
    transitions: u64,
}

pub struct LeaderElector {
    config: ElectionConfig,
    ephemeral: Arc<dyn EphemeralCoordinator>,
    durable: Arc<dyn DurableEpochStore>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<ElectionEvent>,
}

impl LeaderElector {
    pub fn new(
        config: ElectionConfig,
        ephemeral: Arc<dyn EphemeralCoordinator>,
        durable: Arc<dyn DurableEpochStore>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            config,
            ephemeral,
            durable,
            inner: Mutex::new(Inner {
                is_leader: false,
                current_value: None,
                current_epoch: 0,
                last_epoch_seen: 0,
                consecutive_renew_failures: 0,
                fencing_handle: None,
                transitions: 0,
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ElectionEvent> {
        self.events.subscribe()
    }

    pub fn is_leader(&self) -> bool {
        self.inner.lock().is_leader
    }

    pub fn current_epoch(&self) -> i64 {
        self.inner.lock().current_epoch
    }

    pub fn leader_transitions(&self) -> u64 {
        self.inner.lock().transitions
    }

    /// Runs the acquire/renew loop until `shutdown` fires, then releases
    /// the lease (if held) using a fresh, short-lived grace window so
    /// release can still succeed after the outer loop was asked to stop.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = self.config.base_interval();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let is_leader = self.inner.lock().is_leader;
            let outcome = if is_leader { self.renew().await } else { self.try_acquire().await };

            interval = match outcome {
                LoopOutcome::Success => self.config.base_interval(),
                LoopOutcome::NotAcquired => self.config.base_interval(),
                LoopOutcome::Error => (interval * 2).min(self.config.max_backoff),
            };
        }
        self.release_on_exit().await;
    }

    async fn try_acquire(&self) -> LoopOutcome {
        let epoch = match self.durable.increment_durable_epoch(&self.config.resource).await {
            Ok(epoch) => epoch,
            Err(e) => {
                error!(error = ?e, "failed to increment durable epoch");
                return LoopOutcome::Error;
            }
        };

        {
            let mut inner = self.inner.lock();
            if epoch > inner.last_epoch_seen + 1 {
                warn!(
                    previous = inner.last_epoch_seen,
                    observed = epoch,
                    "epoch drift detected during leader acquisition"
                );
            }
            inner.last_epoch_seen = epoch;
        }

        let now = chrono_now_millis();
        let ttl = self.config.lease_ttl;
        let meta = LeaseMetadata::new(
            self.config.owner_id.clone(),
            epoch,
            lease_req_id(epoch),
            now,
            now + ttl.as_millis() as i64,
        );
        let bytes = meta.to_bytes();

        match self.ephemeral.acquire_lease(&self.config.lock_key(), bytes.clone(), ttl).await {
            Ok(true) => {
                let (ctx, handle) = new_fenced_context(epoch);
                let mut inner = self.inner.lock();
                inner.is_leader = true;
                inner.current_value = Some(bytes);
                inner.current_epoch = epoch;
                inner.consecutive_renew_failures = 0;
                inner.fencing_handle = Some(handle);
                inner.transitions += 1;
                drop(inner);
                info!(epoch, owner = %self.config.owner_id, "acquired leadership");
                let _ = self.events.send(ElectionEvent::Elected(ctx));
                LoopOutcome::Success
            }
            Ok(false) => LoopOutcome::NotAcquired,
            Err(e) => {
                error!(error = ?e, "transient error acquiring leader lease");
                LoopOutcome::Error
            }
        }
    }

    async fn renew(&self) -> LoopOutcome {
        let current_value = match self.inner.lock().current_value.clone() {
            Some(v) => v,
            None => return LoopOutcome::Error,
        };
        match self.ephemeral.renew_lease(&self.config.lock_key(), &current_value, self.config.lease_ttl).await {
            Ok(true) => {
                self.inner.lock().consecutive_renew_failures = 0;
                LoopOutcome::Success
            }
            Ok(false) => {
                warn!("lease renewal rejected, stepping down");
                self.step_down();
                LoopOutcome::Error
            }
            Err(e) => {
                let failures = {
                    let mut inner = self.inner.lock();
                    inner.consecutive_renew_failures += 1;
                    inner.consecutive_renew_failures
                };
                error!(error = ?e, failures, "transient error renewing leader lease");
                if failures >= self.config.max_consecutive_renew_failures {
                    warn!(failures, "too many consecutive renew failures, stepping down");
                    self.step_down();
                }
                LoopOutcome::Error
            }
        }
    }

    /// Cancels the fenced context (so in-flight work observes the fence
    /// first), then flips `is_leader`, then notifies subscribers exactly
    /// once — matching the invariant that `onLost` fires after the context
    /// is revoked and that the flag never observably flips without it.
    fn step_down(&self) {
        let mut inner = self.inner.lock();
        if !inner.is_leader {
            return;
        }
        if let Some(handle) = inner.fencing_handle.take() {
            handle.revoke();
        }
        inner.is_leader = false;
        inner.current_value = None;
        inner.transitions += 1;
        drop(inner);
        let _ = self.events.send(ElectionEvent::Lost);
    }

    /// Test-only hook that simulates an epoch bump without a full
    /// step-down/re-acquire cycle, for exercising the reconciliation
    /// coordinator's dual-epoch guard in isolation.
    #[cfg(test)]
    pub fn force_epoch_for_test(&self, epoch: i64) {
        self.inner.lock().current_epoch = epoch;
    }

    async fn release_on_exit(&self) {
        let (current_value, was_leader) = {
            let inner = self.inner.lock();
            (inner.current_value.clone(), inner.is_leader)
        };
        if !was_leader {
            return;
        }
        let Some(value) = current_value else { return };
        let release = self.ephemeral.release_lease(&self.config.lock_key(), &value);
        match tokio::time::timeout(self.config.release_timeout, release).await {
            Ok(Ok(())) => info!("released leader lease on shutdown"),
            Ok(Err(e)) => error!(error = ?e, "failed to release leader lease on shutdown"),
            Err(_) => error!("timed out releasing leader lease on shutdown"),
        }
        self.step_down();
    }
}

enum LoopOutcome {
    Success,
    NotAcquired,
    Error,
}

fn chrono_now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A request id for the lease metadata. A monotonic, process-local tag
/// derived from the epoch is sufficient since its only job is to appear in
/// diagnostics, not to be globally unique.
fn lease_req_id(epoch: i64) -> String {
    format!("election-{epoch}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxforge_coordinator::memory::{InMemoryDurableStore, InMemoryEphemeralCoordinator};
    use std::time::Duration as StdDuration;

    fn config() -> ElectionConfig {
        ElectionConfig {
            resource: "leader_election".to_string(),
            lease_ttl: StdDuration::from_millis(60),
            owner_id: "node-a".to_string(),
            max_consecutive_renew_failures: 2,
            max_backoff: StdDuration::from_millis(600),
            release_timeout: StdDuration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn single_elector_becomes_leader_and_gets_fenced_context() {
        let ephemeral = Arc::new(InMemoryEphemeralCoordinator::new());
        let durable = Arc::new(InMemoryDurableStore::new());
        let elector = LeaderElector::new(config(), ephemeral, durable);
        let mut events = elector.subscribe();
        let token = CancellationToken::new();
        let run_token = token.clone();
        let elector_clone = elector.clone();
        let handle = tokio::spawn(async move { elector_clone.run(run_token).await });

        let event = tokio::time::timeout(StdDuration::from_secs(1), events.recv()).await.unwrap().unwrap();
        match event {
            ElectionEvent::Elected(ctx) => assert!(ctx.epoch() >= 1),
            ElectionEvent::Lost => panic!("expected Elected first"),
        }
        assert!(elector.is_leader());

        token.cancel();
        handle.await.unwrap();
        assert!(!elector.is_leader());
    }

    #[tokio::test]
    async fn epoch_is_burned_even_on_losing_attempt() {
        let ephemeral = Arc::new(InMemoryEphemeralCoordinator::new());
        let durable = Arc::new(InMemoryDurableStore::new());
        // Pre-acquire the lease out from under the elector with an unrelated owner.
        ephemeral
            .acquire_lease(&config().lock_key(), b"someone-else".to_vec(), StdDuration::from_secs(5))
            .await
            .unwrap();
        let elector = LeaderElector::new(config(), ephemeral, durable.clone());
        let outcome = elector.try_acquire().await;
        assert!(matches!(outcome, LoopOutcome::NotAcquired));
        assert_eq!(durable.get_durable_epoch("leader_election").await.unwrap(), 1);
    }
}
