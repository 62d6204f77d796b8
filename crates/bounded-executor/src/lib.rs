// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! An executor that caps the number of futures running concurrently.
//!
//! The scheduler (§4.K, §5) dispatches reconciliations onto this executor so
//! that `activeTasks` never exceeds `maxConcurrency`: each `spawn` call
//! blocks on a semaphore permit before handing the future to the underlying
//! Tokio runtime, so backpressure is applied at the call site rather than by
//! letting unbounded work pile up on the runtime's scheduler.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinHandle;

/// A `tokio` executor that only permits a bounded number of tasks to run
/// concurrently at once.
///
/// Cloning a `BoundedExecutor` is cheap: the semaphore and runtime handle
/// are both reference-counted, so every clone shares the same capacity.
#[derive(Clone, Debug)]
pub struct BoundedExecutor {
    semaphore: Arc<Semaphore>,
    executor: Handle,
}

impl BoundedExecutor {
    /// Creates a new `BoundedExecutor` that admits at most `capacity`
    /// concurrent tasks onto `executor`.
    pub fn new(capacity: usize, executor: Handle) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            executor,
        }
    }

    /// Creates a `BoundedExecutor` bound to the handle of the runtime this
    /// is called from. Panics outside of a Tokio runtime context, matching
    /// `Handle::current`.
    pub fn new_on_current(capacity: usize) -> Self {
        Self::new(capacity, Handle::current())
    }

    /// The maximum number of tasks this executor will ever run at once.
    pub fn capacity(&self) -> usize {
        // add_permits/forget never change the original capacity in our usage,
        // so available_permits() at construction time is the ceiling.
        self.semaphore.available_permits()
    }

    /// Acquires a permit, then spawns `future` onto the bound runtime.
    ///
    /// This blocks (asynchronously) until a permit is available, so callers
    /// that need to avoid blocking should race this against cancellation —
    /// the scheduler's dispatch pipeline does this via its own global
    /// concurrency check (§4.K step 6) before ever calling `spawn`.
    pub async fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("BoundedExecutor semaphore is never closed");
        self.executor.spawn(async move {
            let out = future.await;
            drop(permit);
            out
        })
    }

    /// Like [`spawn`](Self::spawn), but returns `None` immediately instead
    /// of waiting when no permit is currently available.
    pub fn try_spawn<F>(&self, future: F) -> Option<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(self.executor.spawn(async move {
            let out = future.await;
            drop(permit);
            out
        }))
    }

    /// Number of permits currently free. Racy by nature (another caller can
    /// acquire between this read and a subsequent `spawn`); useful only for
    /// approximate saturation reporting (the operator snapshot's
    /// `worker_saturation`).
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits until a permit would be immediately available, without holding
    /// it. Exists for tests that want to assert back-pressure without
    /// racing a real spawn.
    pub async fn acquire_probe(&self) -> Result<(), AcquireError> {
        let permit = self.semaphore.acquire().await?;
        drop(permit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn runs_up_to_capacity_concurrently() {
        let executor = BoundedExecutor::new_on_current(2);
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let running = running.clone();
            let max_seen = max_seen.clone();
            let release = release.clone();
            handles.push(
                executor
                    .spawn(async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        release.notified().await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await,
            );
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 2);
        release.notify_waiters();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn try_spawn_fails_fast_when_saturated() {
        let executor = BoundedExecutor::new_on_current(1);
        let release = Arc::new(Notify::new());
        let release2 = release.clone();
        let _occupying = executor
            .spawn(async move {
                release2.notified().await;
            })
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(executor.try_spawn(async {}).is_none());
        release.notify_waiters();
    }
}
