// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;

/// A value read back from the versioned key-value space, alongside the
/// version it was written with. Callers compare-and-swap against `version`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: u64,
}

/// The ephemeral, lease-backed coordination surface every node depends on
/// for leader election (§4.H), the lock janitor (§4.I) and degraded-mode
/// reconciliation (§4.M). Implementations are expected to expire entries
/// on their own; callers never assume a key survives past its TTL.
#[async_trait]
pub trait EphemeralCoordinator: Send + Sync {
    /// Attempts to create `key` with `value`, succeeding only if the key is
    /// absent or already expired. Returns `false` on contention.
    async fn acquire_lease(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<bool>;

    /// Extends the TTL of `key` iff its current value equals `expected_value`.
    /// Returns `false` if the lease was lost (fenced out or expired).
    async fn renew_lease(&self, key: &str, expected_value: &[u8], ttl: Duration) -> anyhow::Result<bool>;

    /// Releases `key` iff its current value equals `expected_value`. A
    /// mismatch is not an error: it means the lease already changed hands.
    async fn release_lease(&self, key: &str, expected_value: &[u8]) -> anyhow::Result<()>;

    /// Reads the current owner of `key` without taking it, for status and
    /// snapshot reporting.
    async fn get_lock_owner(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Lists live keys matching `pattern` (a simple prefix pattern, not a
    /// full glob), used by the lock janitor's fencing and staleness sweeps.
    async fn scan_locks(&self, pattern: &str) -> anyhow::Result<Vec<String>>;

    /// Reads a versioned value written via `set_versioned`.
    async fn get_versioned(&self, key: &str) -> anyhow::Result<Option<VersionedValue>>;

    /// Compare-and-swaps `key` to `value` iff the key is absent/expired or
    /// `version` is strictly greater than the stored version. Returns
    /// whether the swap applied.
    async fn set_versioned(&self, key: &str, value: Vec<u8>, version: u64, ttl: Duration) -> anyhow::Result<bool>;

    /// Plain mutual-exclusion lock used by the alternate reconciliation-lock
    /// mode (§4.M): no value, no version, just presence with a TTL.
    async fn acquire_lock(&self, key: &str, ttl: Duration) -> anyhow::Result<bool>;

    /// Releases a plain lock taken with `acquire_lock`.
    async fn release_lock(&self, key: &str) -> anyhow::Result<()>;
}
