// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Thread-safe priority queue over `ReconciliationTask` (§4.C).
//!
//! Ordering is `effective(t) = priority(t) - age(t)/10s`, smaller wins; ties
//! on `floor(effective)` break on earlier `deadline`. Aging is recomputed
//! against wall-clock `now` every time two tasks are compared, so a task's
//! position keeps advancing the longer it waits without needing a separate
//! re-heapify pass — the same trick a `container/heap` with a time-reading
//! `Less` would use.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::trace;

use fluxforge_types::ReconciliationTask;

/// Seconds of waiting that offset one point of priority (§4.C).
const AGING_SECONDS_PER_PRIORITY_POINT: f64 = 10.0;

#[derive(Clone, Debug)]
struct QueuedTask(ReconciliationTask);

impl QueuedTask {
    fn effective(&self) -> f64 {
        let submitted = self.0.submit_time.unwrap_or(self.0.enqueued_time);
        let age_secs = (Utc::now() - submitted).num_milliseconds().max(0) as f64 / 1000.0;
        self.0.priority as f64 - age_secs / AGING_SECONDS_PER_PRIORITY_POINT
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    /// `std::collections::BinaryHeap` is a max-heap, so "greater" here means
    /// "more urgent, pop me first": a strictly lower effective priority, or
    /// an equal (floored) effective priority with an earlier deadline.
    fn cmp(&self, other: &Self) -> Ordering {
        let self_floor = self.effective().floor();
        let other_floor = other.effective().floor();
        match other_floor.partial_cmp(&self_floor).unwrap_or(Ordering::Equal) {
            Ordering::Equal => other.0.deadline.cmp(&self.0.deadline),
            ord => ord,
        }
    }
}

/// A shared, cloneable handle onto one priority queue. Clones all observe
/// and mutate the same underlying heap — cheap to hand to a background
/// `push_delayed` task.
#[derive(Clone, Debug, Default)]
pub struct PriorityQueue {
    heap: Arc<Mutex<BinaryHeap<QueuedTask>>>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `task` immediately. Does not touch `submit_time`/
    /// `enqueued_time` — the admission path (§4.K step 7) is responsible for
    /// stamping those before calling this.
    pub fn push(&self, task: ReconciliationTask) {
        self.heap.lock().push(QueuedTask(task));
    }

    /// Removes and returns the most urgent task, if any.
    pub fn pop(&self) -> Option<ReconciliationTask> {
        self.heap.lock().pop().map(|q| q.0)
    }

    /// Returns a clone of the most urgent task without removing it.
    pub fn peek(&self) -> Option<ReconciliationTask> {
        self.heap.lock().peek().map(|q| q.0.clone())
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-pushes `task` after `delay` has elapsed, on a detached task. Used
    /// by every backpressure path (rate limit, domain throttle, global
    /// concurrency) instead of blocking the worker tick (§4.K, §9).
    pub fn push_delayed(&self, task: ReconciliationTask, delay: Duration) {
        let heap = self.heap.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(request_id = %task.request_id, delay_ms = delay.as_millis() as u64, "requeue delay elapsed");
            heap.lock().push(QueuedTask(task));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn task_with(priority: u8, submit_time: chrono::DateTime<Utc>) -> ReconciliationTask {
        let mut t = ReconciliationTask::new("node-a", "tenant-a", "state-1", priority, Utc::now() + ChronoDuration::minutes(5));
        t.submit_time = Some(submit_time);
        t
    }

    #[test]
    fn aged_low_priority_beats_recent_medium() {
        let queue = PriorityQueue::new();
        let aged = task_with(10, Utc::now() - ChronoDuration::minutes(2));
        let recent = task_with(5, Utc::now());
        queue.push(aged.clone());
        queue.push(recent);
        let popped = queue.pop().unwrap();
        assert_eq!(popped.request_id, aged.request_id);
    }

    #[test]
    fn equal_effective_priority_breaks_on_deadline() {
        let queue = PriorityQueue::new();
        let now = Utc::now();
        let mut earlier_deadline = task_with(3, now);
        earlier_deadline.deadline = now + ChronoDuration::seconds(10);
        let mut later_deadline = task_with(3, now);
        later_deadline.deadline = now + ChronoDuration::seconds(100);
        queue.push(later_deadline);
        queue.push(earlier_deadline.clone());
        let popped = queue.pop().unwrap();
        assert_eq!(popped.request_id, earlier_deadline.request_id);
    }

    #[test]
    fn peek_does_not_remove() {
        let queue = PriorityQueue::new();
        queue.push(task_with(1, Utc::now()));
        assert!(queue.peek().is_some());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn push_delayed_reappears_after_delay() {
        let queue = PriorityQueue::new();
        let task = task_with(2, Utc::now());
        queue.push_delayed(task.clone(), Duration::from_secs(5));
        assert_eq!(queue.len(), 0);
        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().request_id, task.request_id);
    }
}
