// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Degraded Mode (§4.L): a bounded local write-behind cache used while the
//! ephemeral store is unavailable, plus the pending-write ledger the
//! Reconciliation Coordinator later flushes.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::warn;

use fluxforge_config::DegradedModeConfig;
use fluxforge_types::{CacheEntry, PendingWrite};

pub struct DegradedMode {
    config: DegradedModeConfig,
    cache: Mutex<LruCache<String, CacheEntry>>,
    pending: Mutex<VecDeque<PendingWrite>>,
    current_version: AtomicU64,
    redis_available: AtomicBool,
    db_available: AtomicBool,
    nats_available: AtomicBool,
}

impl DegradedMode {
    pub fn new(config: DegradedModeConfig) -> Self {
        let capacity = NonZeroUsize::new(config.local_cache_capacity.max(1)).unwrap();
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            pending: Mutex::new(VecDeque::with_capacity(config.pending_writes_capacity.min(4096))),
            current_version: AtomicU64::new(0),
            redis_available: AtomicBool::new(true),
            db_available: AtomicBool::new(true),
            nats_available: AtomicBool::new(true),
            config,
        }
    }

    pub fn set_redis_available(&self, available: bool) {
        self.redis_available.store(available, Ordering::SeqCst);
    }

    pub fn set_db_available(&self, available: bool) {
        self.db_available.store(available, Ordering::SeqCst);
    }

    pub fn set_nats_available(&self, available: bool) {
        self.nats_available.store(available, Ordering::SeqCst);
    }

    /// Any one of the three backing dependencies being down puts the node
    /// into degraded mode — they collectively drive the flag (§4.L).
    pub fn degraded_mode_active(&self) -> bool {
        !self.redis_available.load(Ordering::SeqCst)
            || !self.db_available.load(Ordering::SeqCst)
            || !self.nats_available.load(Ordering::SeqCst)
    }

    /// Buffers a write: bumps the monotonic version counter, appends a
    /// `PendingWrite`, and mirrors the value into the local cache so reads
    /// see it immediately. Returns the version assigned.
    pub fn write(&self, key: impl Into<String>, value: Vec<u8>, ttl: Option<Duration>) -> u64 {
        let key = key.into();
        let version = self.current_version.fetch_add(1, Ordering::SeqCst) + 1;
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let write = PendingWrite::new(key.clone(), value.clone(), ttl, version);

        {
            let mut pending = self.pending.lock();
            if pending.len() >= self.config.pending_writes_capacity {
                Self::evict_oldest_unreconciled(&mut pending);
            }
            pending.push_back(write);
        }
        self.cache.lock().put(key, CacheEntry::new(value));
        version
    }

    /// Drops the oldest unreconciled entry to make room; if every entry
    /// happens to already be reconciled (a compaction simply hasn't run
    /// yet), falls back to dropping the oldest entry outright.
    fn evict_oldest_unreconciled(pending: &mut VecDeque<PendingWrite>) {
        if let Some(pos) = pending.iter().position(|w| !w.reconciled) {
            pending.remove(pos);
        } else {
            pending.pop_front();
        }
    }

    /// Reads from the local cache, refreshing its LRU position.
    pub fn get_from_cache(&self, key: &str) -> Option<Vec<u8>> {
        let mut cache = self.cache.lock();
        let entry = cache.get_mut(key)?;
        entry.touch();
        Some(entry.value.clone())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// A snapshot of every write not yet reconciled, oldest first.
    pub fn unreconciled_writes(&self) -> Vec<PendingWrite> {
        self.pending.lock().iter().filter(|w| !w.reconciled).cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Marks the entry for `key`/`version` reconciled. A no-op if the entry
    /// is no longer present (already compacted).
    pub fn mark_reconciled(&self, key: &str, version: u64) {
        let mut pending = self.pending.lock();
        if let Some(entry) = pending.iter_mut().find(|w| w.key == key && w.version == version) {
            entry.reconciled = true;
        } else {
            warn!(key, version, "mark_reconciled found no matching pending write");
        }
    }

    /// Drops every reconciled entry, keeping the ledger to only what still
    /// needs flushing (§4.M step 7).
    pub fn compact(&self) {
        self.pending.lock().retain(|w| !w.reconciled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DegradedModeConfig {
        DegradedModeConfig {
            local_cache_capacity: 2,
            pending_writes_capacity: 2,
            ..DegradedModeConfig::default()
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let mode = DegradedMode::new(DegradedModeConfig::default());
        let version = mode.write("k1", b"v1".to_vec(), None);
        assert_eq!(version, 1);
        assert_eq!(mode.get_from_cache("k1"), Some(b"v1".to_vec()));
    }

    #[test]
    fn version_is_strictly_increasing() {
        let mode = DegradedMode::new(DegradedModeConfig::default());
        let v1 = mode.write("k1", b"a".to_vec(), None);
        let v2 = mode.write("k2", b"b".to_vec(), None);
        assert!(v2 > v1);
    }

    #[test]
    fn cache_bounded_by_lru() {
        let mode = DegradedMode::new(config());
        mode.write("k1", b"a".to_vec(), None);
        mode.write("k2", b"b".to_vec(), None);
        mode.write("k3", b"c".to_vec(), None);
        assert_eq!(mode.cache_len(), 2);
        assert!(mode.get_from_cache("k1").is_none());
    }

    #[test]
    fn pending_ledger_evicts_oldest_unreconciled_first() {
        let mode = DegradedMode::new(config());
        mode.write("k1", b"a".to_vec(), None);
        mode.write("k2", b"b".to_vec(), None);
        mode.mark_reconciled("k2", 2);
        mode.write("k3", b"c".to_vec(), None);
        // k1 is the oldest unreconciled entry and should have been evicted,
        // even though k2 (reconciled) is older still.
        let remaining: Vec<String> = mode.unreconciled_writes().into_iter().map(|w| w.key).collect();
        assert_eq!(remaining, vec!["k3".to_string()]);
    }

    #[test]
    fn degraded_mode_active_when_any_dependency_down() {
        let mode = DegradedMode::new(DegradedModeConfig::default());
        assert!(!mode.degraded_mode_active());
        mode.set_redis_available(false);
        assert!(mode.degraded_mode_active());
    }

    #[test]
    fn compact_drops_reconciled_entries() {
        let mode = DegradedMode::new(DegradedModeConfig::default());
        mode.write("k1", b"a".to_vec(), None);
        mode.mark_reconciled("k1", 1);
        mode.compact();
        assert_eq!(mode.pending_len(), 0);
    }
}
