// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-key token bucket rate limiters (§4.D), used for the node limiter and
//! the tenant limiter. Buckets are created lazily on first query and, for
//! node keys, eagerly on health registration (`KeyedRateLimiter::ensure`).

use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

/// A single token bucket: `capacity` tokens refilling at `refill_per_sec`,
/// never exceeding `capacity`.
struct Bucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(rps: f64, burst: u32) -> Self {
        Self {
            capacity: burst.max(1) as f64,
            refill_per_sec: rps.max(0.0),
            tokens: burst.max(1) as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Tries to take one token. On success, returns `(true, Duration::ZERO)`.
    /// On failure, returns `(false, delay)` where `delay` is the soonest the
    /// next token becomes available — no token is consumed.
    fn reserve(&mut self, now: Instant) -> (bool, Duration) {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return (true, Duration::ZERO);
        }
        if self.refill_per_sec <= 0.0 {
            // A zero-rate bucket never refills; callers should treat this as
            // an effectively infinite delay rather than dividing by zero.
            return (false, Duration::from_secs(u64::MAX / 2));
        }
        let deficit = 1.0 - self.tokens;
        let wait_secs = deficit / self.refill_per_sec;
        (false, Duration::from_secs_f64(wait_secs.max(0.0)))
    }
}

/// A map of independently-ticking token buckets, one per key, all sharing
/// the same rate/burst configuration. Guarded internally — callers never
/// need an outer lock (§5 "Rate-limiter map: guarded internally by the
/// limiter's mutex; lazy creation").
pub struct KeyedRateLimiter {
    rps: f64,
    burst: u32,
    buckets: DashMap<String, Mutex<Bucket>>,
}

impl KeyedRateLimiter {
    pub fn new(rps: f64, burst: u32) -> Self {
        Self {
            rps,
            burst,
            buckets: DashMap::new(),
        }
    }

    /// Ensures a bucket exists for `key` without consuming a token. Called
    /// on node health registration so a brand-new node's first dispatch
    /// attempt sees a fully-seeded bucket rather than one created mid-burst.
    pub fn ensure(&self, key: &str) {
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(Bucket::new(self.rps, self.burst)));
    }

    /// Simple boolean admission check: consumes a token iff one is
    /// immediately available.
    pub fn allow(&self, key: &str) -> bool {
        self.reserve(key).0
    }

    /// Reserves a token for `key`. On failure the reservation is implicitly
    /// cancelled (no token is deducted) and the returned delay is the
    /// soonest retry should succeed.
    pub fn reserve(&self, key: &str) -> (bool, Duration) {
        let now = Instant::now();
        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(Bucket::new(self.rps, self.burst)));
        entry.lock().reserve(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_throttle() {
        let limiter = KeyedRateLimiter::new(5.0, 1);
        assert!(limiter.allow("node-a"));
        let (allowed, delay) = limiter.reserve("node-a");
        assert!(!allowed);
        assert!(delay > Duration::ZERO);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = KeyedRateLimiter::new(5.0, 1);
        assert!(limiter.allow("node-a"));
        assert!(limiter.allow("node-b"));
    }

    #[tokio::test(start_paused = true)]
    async fn refills_over_time() {
        let limiter = KeyedRateLimiter::new(10.0, 1);
        assert!(limiter.allow("node-a"));
        assert!(!limiter.allow("node-a"));
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(limiter.allow("node-a"));
    }

    #[test]
    fn ensure_preseeds_a_full_bucket() {
        let limiter = KeyedRateLimiter::new(5.0, 3);
        limiter.ensure("node-a");
        assert!(limiter.allow("node-a"));
        assert!(limiter.allow("node-a"));
        assert!(limiter.allow("node-a"));
        assert!(!limiter.allow("node-a"));
    }
}
