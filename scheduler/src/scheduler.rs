// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scheduler (§4.K): admission-controlled priority queue plus the worker
//! loop that pops, throttles, and dispatches reconciliations. Owns the glue
//! between every other component in this crate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fluxforge_bounded_executor::BoundedExecutor;
use fluxforge_config::SchedulerConfig;
use fluxforge_coordinator::{DurableEpochStore, FencedContext, Reconciler};
use fluxforge_types::{owns_shard, AdmissionError, AdmissionMode, ReconciliationTask, RuntimeMode, Stage};

use crate::circuit_breaker::CircuitBreaker;
use crate::elector::{ElectionEvent, LeaderElector};
use crate::health::HealthRegistry;
use crate::operator::{OperatorControl, OperatorSnapshot};
use crate::queue::PriorityQueue;
use crate::rate_limiter::KeyedRateLimiter;
use crate::timeline::Timeline;

struct SchedulerState {
    admission_mode: AdmissionMode,
    runtime_mode: RuntimeMode,
    is_active: bool,
    active_tasks: usize,
    domain_active: HashMap<String, u32>,
    domain_failures: HashMap<String, u32>,
}

/// One failure domain bucket's effective concurrency limit (§4.K step 3 of
/// the dispatch pipeline): domains that have racked up more than
/// `domain_failure_threshold` failures are throttled down to
/// `domain_throttled_limit` concurrent dispatches.
fn domain_limit(config: &SchedulerConfig, failures: u32) -> u32 {
    if failures > config.domain_failure_threshold {
        config.domain_throttled_limit
    } else {
        config.domain_normal_limit
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    node_id: String,
    tenant_min_penalty: Duration,
    state: Mutex<SchedulerState>,
    queue: PriorityQueue,
    node_limiter: Arc<KeyedRateLimiter>,
    tenant_limiter: Arc<KeyedRateLimiter>,
    health: HealthRegistry,
    breaker: CircuitBreaker,
    timeline: Timeline,
    executor: BoundedExecutor,
    elector: Arc<LeaderElector>,
    reconciler: Arc<dyn Reconciler>,
    durable: Arc<dyn DurableEpochStore>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SchedulerConfig,
        node_id: impl Into<String>,
        tenant_min_penalty: Duration,
        node_limiter: Arc<KeyedRateLimiter>,
        tenant_limiter: Arc<KeyedRateLimiter>,
        health: HealthRegistry,
        breaker: CircuitBreaker,
        timeline: Timeline,
        executor: BoundedExecutor,
        elector: Arc<LeaderElector>,
        reconciler: Arc<dyn Reconciler>,
        durable: Arc<dyn DurableEpochStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            node_id: node_id.into(),
            tenant_min_penalty,
            state: Mutex::new(SchedulerState {
                admission_mode: AdmissionMode::Normal,
                runtime_mode: RuntimeMode::Normal,
                is_active: false,
                active_tasks: 0,
                domain_active: HashMap::new(),
                domain_failures: HashMap::new(),
            }),
            queue: PriorityQueue::new(),
            node_limiter,
            tenant_limiter,
            health,
            breaker,
            timeline,
            executor,
            elector,
            reconciler,
            durable,
        })
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn active_tasks(&self) -> usize {
        self.state.lock().active_tasks
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().is_active
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn saturation(&self) -> f64 {
        self.active_tasks() as f64 / self.config.max_concurrency.max(1) as f64
    }

    /// Admission order per §4.K: the first failing check wins, and `task`
    /// is never touched once rejected.
    pub fn submit(&self, mut task: ReconciliationTask) -> Result<(), AdmissionError> {
        let (admission_mode, runtime_mode, is_active) = {
            let state = self.state.lock();
            (state.admission_mode, state.runtime_mode, state.is_active)
        };

        if !is_active {
            return Err(AdmissionError::NotLeader);
        }
        match admission_mode {
            AdmissionMode::Freeze => return Err(AdmissionError::Freeze),
            AdmissionMode::Drain => return Err(AdmissionError::Drain),
            AdmissionMode::Normal => {}
        }

        // Canary-tier nodes are the breaker's own recovery probes; gating
        // them behind the breaker would deadlock recovery (§4.K, §9).
        if !self.health.is_canary(&task.node_id) && !self.breaker.should_admit(self.queue.len(), self.saturation()) {
            return Err(AdmissionError::CircuitOpen);
        }

        match runtime_mode {
            RuntimeMode::ReadOnly | RuntimeMode::Draining => return Err(AdmissionError::ReadOnlyMode),
            RuntimeMode::Degraded if task.priority > self.config.degraded_mode_priority_ceiling => {
                return Err(AdmissionError::DegradedMode);
            }
            _ => {}
        }

        if self.queue.len() > self.config.backpressure_queue_len && task.priority >= self.config.backpressure_min_priority {
            return Err(AdmissionError::QueueFull);
        }

        if self.config.shard_count > 1 && !owns_shard(&task.node_id, self.config.shard_index, self.config.shard_count) {
            return Err(AdmissionError::WrongShard);
        }

        if task.submit_time.is_none() {
            task.submit_time = Some(chrono::Utc::now());
        }
        task.enqueued_time = chrono::Utc::now();
        self.timeline
            .record_stage(&task.request_id, Stage::Queued, &task.node_id, &task.tenant_id, &task.state_id);
        self.queue.push(task);
        Ok(())
    }

    /// Called once per `ElectionEvent::Elected`: flips the scheduler active
    /// and rehydrates any pending/drifted desired state before the worker
    /// loop resumes ticking.
    pub async fn on_elected(&self, ctx: &FencedContext) {
        self.state.lock().is_active = true;
        info!(epoch = ctx.epoch(), "scheduler activated");
        if let Err(e) = self.rehydrate().await {
            error!(error = ?e, "rehydration on election failed");
        }
    }

    pub fn on_lost(&self) {
        self.state.lock().is_active = false;
        info!("scheduler deactivated after losing leadership");
    }

    async fn rehydrate(&self) -> anyhow::Result<()> {
        for status in &self.config.rehydration_statuses {
            let states = self
                .durable
                .list_states_by_status(status, self.config.shard_index, self.config.shard_count)
                .await?;
            let count = states.len();
            for state in states {
                let deadline = chrono::Utc::now() + chrono::Duration::minutes(5);
                let task = ReconciliationTask::new(
                    state.node_id,
                    state.tenant_id,
                    state.state_id,
                    self.config.rehydration_default_priority,
                    deadline,
                );
                if let Err(e) = self.submit(task) {
                    debug!(reason = %e, status, "rehydrated task rejected at submission");
                }
            }
            if count > 0 {
                info!(status, count, "rehydrated desired states on election");
            }
        }
        Ok(())
    }

    /// Drives the elector's broadcast of elections/losses into worker-loop
    /// lifecycle: one worker loop per leadership term, cancelled the moment
    /// leadership is lost.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut events = self.elector.subscribe();
        let mut term: Option<(CancellationToken, tokio::task::JoinHandle<()>)> = None;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(ElectionEvent::Elected(ctx)) => {
                        self.on_elected(&ctx).await;
                        let token = CancellationToken::new();
                        let me = self.clone();
                        let worker_token = token.clone();
                        let handle = tokio::spawn(async move { me.worker_loop(ctx, worker_token).await });
                        if let Some((old_token, old_handle)) = term.replace((token, handle)) {
                            old_token.cancel();
                            let _ = old_handle.await;
                        }
                    }
                    Ok(ElectionEvent::Lost) => {
                        self.on_lost();
                        if let Some((token, handle)) = term.take() {
                            token.cancel();
                            let _ = handle.await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "scheduler lagged behind election events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        if let Some((token, handle)) = term.take() {
            token.cancel();
            let _ = handle.await;
        }
    }

    async fn worker_loop(self: Arc<Self>, ctx: FencedContext, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(self.config.freeze_window) => {}
        }
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(task) = self.queue.pop() {
                        self.dispatch(task, ctx.clone()).await;
                    }
                }
            }
        }
    }

    /// The per-task dispatch pipeline (§4.K): every popped task ends in
    /// exactly one of dropped, requeued, abandoned, or dispatched.
    async fn dispatch(self: &Arc<Self>, mut task: ReconciliationTask, ctx: FencedContext) {
        let wait = chrono::Utc::now() - task.enqueued_time;
        debug!(request_id = %task.request_id, wait_ms = wait.num_milliseconds().max(0), "observed admission wait");

        if self.health.is_quarantined(&task.node_id) {
            self.record(&task, Stage::QuarantineDrop);
            warn!(request_id = %task.request_id, node_id = %task.node_id, "quarantine drop");
            return;
        }

        let domain = task.failure_domain.clone().unwrap_or_else(|| "default".to_string());
        let domain_blocked = {
            let state = self.state.lock();
            let failures = state.domain_failures.get(&domain).copied().unwrap_or(0);
            let limit = domain_limit(&self.config, failures);
            state.domain_active.get(&domain).copied().unwrap_or(0) >= limit
        };
        if domain_blocked {
            task.attempt_count += 1;
            self.record(&task, Stage::Requeued);
            self.queue.push_delayed(task, self.config.domain_throttle_requeue_delay);
            return;
        }

        let (node_allowed, node_delay) = self.node_limiter.reserve(&task.node_id);
        if !node_allowed {
            task.attempt_count += 1;
            self.record(&task, Stage::Requeued);
            self.queue.push_delayed(task, node_delay);
            return;
        }

        let (tenant_allowed, tenant_delay) = self.tenant_limiter.reserve(&task.tenant_id);
        if !tenant_allowed {
            task.attempt_count += 1;
            self.record(&task, Stage::Requeued);
            self.queue.push_delayed(task, tenant_delay.max(self.tenant_min_penalty));
            return;
        }

        let over_cap = self.state.lock().active_tasks >= self.config.active_tasks_cap;
        if over_cap {
            task.attempt_count += 1;
            self.record(&task, Stage::Requeued);
            self.queue.push_delayed(task, self.config.global_concurrency_requeue_delay);
            return;
        }

        if !ctx.is_current() {
            self.record(&task, Stage::Abandoned);
            warn!(request_id = %task.request_id, "dispatch abandoned: lost the fencing epoch");
            return;
        }

        {
            let mut state = self.state.lock();
            state.active_tasks += 1;
            *state.domain_active.entry(domain.clone()).or_insert(0) += 1;
        }
        self.record(&task, Stage::Dispatch);

        let this = self.clone();
        let reconciler = self.reconciler.clone();
        let task_timeout = self.config.task_timeout;
        let future = async move {
            let result = tokio::time::timeout(task_timeout, reconciler.reconcile(ctx.clone(), &task.tenant_id, &task.state_id)).await;
            let success = match result {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    error!(request_id = %task.request_id, error = ?e, "reconcile returned an error");
                    false
                }
                Err(_) => {
                    error!(request_id = %task.request_id, timeout_secs = task_timeout.as_secs(), "reconcile timed out");
                    false
                }
            };
            this.complete_dispatch(&task, &domain, success);
        };
        let handle = self.executor.spawn(future).await;
        tokio::spawn(async move {
            // A panic inside the dispatch is caught here rather than
            // crashing the worker (§7 "Fatal" / §10.3).
            if let Err(e) = handle.await {
                error!(error = ?e, "dispatch task panicked");
            }
        });
    }

    fn complete_dispatch(&self, task: &ReconciliationTask, domain: &str, success: bool) {
        {
            let mut state = self.state.lock();
            state.active_tasks = state.active_tasks.saturating_sub(1);
            if let Some(count) = state.domain_active.get_mut(domain) {
                *count = count.saturating_sub(1);
            }
            if !success {
                *state.domain_failures.entry(domain.to_string()).or_insert(0) += 1;
            }
        }
        self.record(task, if success { Stage::Finished } else { Stage::Failed });
        if success {
            self.breaker.record_success(self.queue.len(), self.saturation());
        } else {
            self.breaker.record_failure();
        }
    }

    fn record(&self, task: &ReconciliationTask, stage: Stage) {
        self.timeline
            .record_stage(&task.request_id, stage, &task.node_id, &task.tenant_id, &task.state_id);
    }

    #[cfg(test)]
    pub fn force_active_for_test(&self, active: bool) {
        self.state.lock().is_active = active;
    }

    #[cfg(test)]
    pub async fn dispatch_one_for_test(self: &Arc<Self>, ctx: FencedContext) -> bool {
        match self.queue.pop() {
            Some(task) => {
                self.dispatch(task, ctx).await;
                true
            }
            None => false,
        }
    }
}

impl OperatorControl for Scheduler {
    fn set_runtime_mode(&self, mode: RuntimeMode) {
        self.state.lock().runtime_mode = mode;
    }

    fn set_admission_mode(&self, mode: AdmissionMode) {
        self.state.lock().admission_mode = mode;
    }

    fn snapshot(&self) -> OperatorSnapshot {
        let state = self.state.lock();
        OperatorSnapshot {
            queue_depth: self.queue.len(),
            active_tasks: state.active_tasks,
            worker_saturation: state.active_tasks as f64 / self.config.max_concurrency.max(1) as f64,
            circuit_breaker_state: self.breaker.state(),
            admission_mode: state.admission_mode,
            runtime_mode: state.runtime_mode,
            is_leader: self.elector.is_leader(),
            current_epoch: self.elector.current_epoch(),
            leader_transitions: self.elector.leader_transitions(),
            node_id: self.node_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fluxforge_config::{CircuitBreakerConfig, ElectionConfig, RateLimiterConfig};
    use fluxforge_coordinator::fencing::new_fenced_context;
    use fluxforge_coordinator::memory::{InMemoryDurableStore, InMemoryEphemeralCoordinator};
    use fluxforge_types::HealthSignal;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubReconciler {
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Reconciler for StubReconciler {
        async fn reconcile(&self, _ctx: FencedContext, _tenant_id: &str, _state_id: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("stub failure");
            }
            Ok(())
        }
    }

    fn harness() -> (Arc<Scheduler>, Arc<StubReconciler>) {
        let ephemeral: Arc<dyn fluxforge_coordinator::EphemeralCoordinator> = Arc::new(InMemoryEphemeralCoordinator::new());
        let durable: Arc<dyn DurableEpochStore> = Arc::new(InMemoryDurableStore::new());
        let elector = LeaderElector::new(ElectionConfig::default(), ephemeral, durable.clone());
        let node_limiter = Arc::new(KeyedRateLimiter::new(1000.0, 1000));
        let tenant_limiter = Arc::new(KeyedRateLimiter::new(1000.0, 1000));
        let health = HealthRegistry::new(node_limiter.clone());
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let timeline = Timeline::new(100);
        let executor = BoundedExecutor::new_on_current(10);
        let reconciler = Arc::new(StubReconciler {
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            "node-under-test",
            RateLimiterConfig::default().tenant_min_penalty,
            node_limiter,
            tenant_limiter,
            health,
            breaker,
            timeline,
            executor,
            elector,
            reconciler.clone(),
            durable,
        );
        scheduler.force_active_for_test(true);
        (scheduler, reconciler)
    }

    fn task(node: &str, priority: u8) -> ReconciliationTask {
        ReconciliationTask::new(node, "tenant-a", "state-1", priority, chrono::Utc::now() + chrono::Duration::minutes(5))
    }

    #[test]
    fn rejects_when_not_active() {
        let (scheduler, _) = harness();
        scheduler.force_active_for_test(false);
        assert_eq!(scheduler.submit(task("node-a", 5)), Err(AdmissionError::NotLeader));
    }

    #[test]
    fn degraded_mode_sheds_low_priority_tasks() {
        let (scheduler, _) = harness();
        scheduler.set_runtime_mode(RuntimeMode::Degraded);
        assert_eq!(scheduler.submit(task("node-a", 10)), Err(AdmissionError::DegradedMode));
        assert!(scheduler.submit(task("node-a", 0)).is_ok());
    }

    #[test]
    fn read_only_rejects_everything() {
        let (scheduler, _) = harness();
        scheduler.set_runtime_mode(RuntimeMode::ReadOnly);
        assert_eq!(scheduler.submit(task("node-a", 10)), Err(AdmissionError::ReadOnlyMode));
        assert_eq!(scheduler.submit(task("node-a", 0)), Err(AdmissionError::ReadOnlyMode));
    }

    #[test]
    fn freeze_and_drain_reject() {
        let (scheduler, _) = harness();
        scheduler.set_admission_mode(AdmissionMode::Freeze);
        assert_eq!(scheduler.submit(task("node-a", 0)), Err(AdmissionError::Freeze));
        scheduler.set_admission_mode(AdmissionMode::Drain);
        assert_eq!(scheduler.submit(task("node-a", 0)), Err(AdmissionError::Drain));
    }

    #[tokio::test]
    async fn quarantined_node_is_dropped_not_dispatched() {
        let (scheduler, reconciler) = harness();
        scheduler.health.update("node-a", HealthSignal::External, 0.0, None);
        scheduler.health.update("node-a", HealthSignal::Observed, 0.0, None);
        let t = task("node-a", 5);
        let request_id = t.request_id.clone();
        scheduler.submit(t).unwrap();

        let (ctx, _handle) = new_fenced_context(1);
        let dispatched = scheduler.dispatch_one_for_test(ctx).await;
        assert!(dispatched);
        assert_eq!(reconciler.calls.load(Ordering::SeqCst), 0);
        let events = scheduler.timeline().by_request_id(&request_id);
        assert_eq!(events.last().unwrap().stage, Stage::QuarantineDrop);
    }

    #[tokio::test]
    async fn healthy_task_dispatches_and_finishes() {
        let (scheduler, reconciler) = harness();
        scheduler.submit(task("node-a", 5)).unwrap();
        let (ctx, _handle) = new_fenced_context(1);
        scheduler.dispatch_one_for_test(ctx).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(reconciler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.active_tasks(), 0);
    }
}
