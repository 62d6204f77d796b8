// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Admission circuit breaker (§4.F): `Closed` / `Open` / `HalfOpen` over
//! queue depth and worker saturation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use fluxforge_config::CircuitBreakerConfig;
use fluxforge_types::CircuitState;

struct Inner {
    state: CircuitState,
    opened_at: Instant,
    test_count: u32,
    saw_failure_in_half_open: bool,
}

/// The breaker itself. Cheap to clone; all clones share one lock.
#[derive(Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                opened_at: Instant::now(),
                test_count: 0,
                saw_failure_in_half_open: false,
            })),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// `ShouldAdmit` (§4.F). Call with the current queue depth and
    /// saturation (`activeTasks / maxConcurrency`); the caller (Submit,
    /// §4.K step 3) is responsible for the canary bypass — canary-tier
    /// nodes never call this at all.
    pub fn should_admit(&self, queue_depth: usize, saturation: f64) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                if queue_depth > self.config.queue_depth_threshold || saturation > self.config.saturation_threshold {
                    warn!(queue_depth, saturation, "circuit breaker tripping open");
                    inner.state = CircuitState::Open;
                    inner.opened_at = Instant::now();
                    false
                } else {
                    true
                }
            }
            CircuitState::Open => {
                if inner.opened_at.elapsed() >= self.config.cooldown {
                    info!("circuit breaker cooldown elapsed, probing half-open");
                    inner.state = CircuitState::HalfOpen;
                    inner.test_count = 0;
                    inner.saw_failure_in_half_open = false;
                    self.admit_half_open(&mut inner)
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => self.admit_half_open(&mut inner),
        }
    }

    fn admit_half_open(&self, inner: &mut Inner) -> bool {
        if inner.test_count < self.config.test_limit {
            inner.test_count += 1;
            true
        } else {
            false
        }
    }

    /// Recording a success in `Closed` is a no-op (§8). In `HalfOpen`, once
    /// the probe window closes without a recorded failure and stress
    /// signals have receded, the breaker closes; the caller re-supplies the
    /// current `queue_depth`/`saturation` because the breaker itself does
    /// not track them outside of `should_admit`.
    pub fn record_success(&self, queue_depth: usize, saturation: f64) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::HalfOpen {
            return;
        }
        if inner.test_count >= self.config.test_limit
            && !inner.saw_failure_in_half_open
            && queue_depth < self.config.half_open_queue_depth_threshold()
            && saturation < self.config.saturation_threshold
        {
            info!("circuit breaker closing after clean half-open probe window");
            inner.state = CircuitState::Closed;
        }
    }

    /// Any recorded failure while `HalfOpen` trips straight back to `Open`.
    /// In `Open` this is a no-op — it must already refuse everything.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                warn!("half-open probe failed, reopening circuit breaker");
                inner.state = CircuitState::Open;
                inner.opened_at = Instant::now();
            }
            CircuitState::Closed => {
                inner.saw_failure_in_half_open = false;
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            queue_depth_threshold: 10,
            saturation_threshold: 0.95,
            cooldown: Duration::from_millis(50),
            test_limit: 2,
        })
    }

    #[test]
    fn closed_admits_under_threshold() {
        let cb = breaker();
        assert!(cb.should_admit(1, 0.1));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn trips_open_over_threshold() {
        let cb = breaker();
        assert!(!cb.should_admit(11, 0.1));
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_admit(0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_test_traffic_even_under_stress() {
        let cb = breaker();
        cb.should_admit(11, 0.1);
        tokio::time::advance(Duration::from_millis(60)).await;
        // Stress signals remain high; half-open must still admit probes.
        assert!(cb.should_admit(999, 0.99));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.should_admit(999, 0.99));
        assert!(!cb.should_admit(999, 0.99));
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let cb = breaker();
        cb.should_admit(11, 0.1);
        tokio::time::advance(Duration::from_millis(60)).await;
        cb.should_admit(0, 0.0);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_closes_after_clean_window() {
        let cb = breaker();
        cb.should_admit(11, 0.1);
        tokio::time::advance(Duration::from_millis(60)).await;
        cb.should_admit(0, 0.0);
        cb.should_admit(0, 0.0);
        cb.record_success(0, 0.0);
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
