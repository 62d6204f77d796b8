// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::utils::duration_millis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the admission-controlled priority scheduler (§4.K, §5).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Post-election settle window before the worker loop resumes ticking.
    #[serde(with = "duration_millis")]
    pub freeze_window: Duration,
    /// Worker tick cadence; at most one task is popped per tick.
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,
    /// Backpressure floor: reject priority > 0 tasks once the queue holds
    /// this many entries.
    pub backpressure_queue_len: usize,
    pub backpressure_min_priority: u8,
    /// Concurrently in-flight dispatches permitted by the bounded executor.
    pub max_concurrency: usize,
    /// Hard semantic cap on `activeTasks`, checked in the dispatch pipeline
    /// independently of the bounded executor's own gate.
    pub active_tasks_cap: usize,
    /// `Degraded` runtime mode sheds tasks with priority strictly greater
    /// than this.
    pub degraded_mode_priority_ceiling: u8,
    /// Failure-domain isolation: concurrency limit once a domain has more
    /// than `domain_failure_threshold` recorded failures.
    pub domain_normal_limit: u32,
    pub domain_throttled_limit: u32,
    pub domain_failure_threshold: u32,
    #[serde(with = "duration_millis")]
    pub domain_throttle_requeue_delay: Duration,
    #[serde(with = "duration_millis")]
    pub global_concurrency_requeue_delay: Duration,
    /// Hard per-task dispatch timeout.
    #[serde(with = "duration_millis")]
    pub task_timeout: Duration,
    /// Desired-state statuses pulled during rehydration-on-election.
    pub rehydration_statuses: Vec<String>,
    pub rehydration_default_priority: u8,
    pub shard_index: u32,
    pub shard_count: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            freeze_window: Duration::from_secs(5),
            tick_interval: Duration::from_millis(100),
            backpressure_queue_len: 1000,
            backpressure_min_priority: 1,
            max_concurrency: 10,
            active_tasks_cap: 100,
            degraded_mode_priority_ceiling: 5,
            domain_normal_limit: 10,
            domain_throttled_limit: 1,
            domain_failure_threshold: 5,
            domain_throttle_requeue_delay: Duration::from_secs(2),
            global_concurrency_requeue_delay: Duration::from_secs(1),
            task_timeout: Duration::from_secs(5 * 60),
            rehydration_statuses: vec!["pending".to_string(), "drifted".to_string()],
            rehydration_default_priority: 5,
            shard_index: 0,
            shard_count: 1,
        }
    }
}
