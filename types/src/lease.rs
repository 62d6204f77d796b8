// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// The value stored under a lock key in the ephemeral coordinator.
///
/// `epoch` is the fencing token: strictly non-decreasing across successful
/// acquisitions of the same resource over the lifetime of the system. Any
/// lease whose `epoch` is less than the current durable epoch for that
/// resource is fenced and must not be honored (§3, §4.I).
///
/// Field order here is the wire contract: `owner_pod, epoch, req_id,
/// created_at, expires_at`. The exact serialized bytes are used as the CAS
/// witness by `RenewLease`/`ReleaseLease`, so encoding must be stable —
/// `to_bytes` always emits fields in this declared order via serde_json,
/// which preserves struct field order for derived `Serialize` impls.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LeaseMetadata {
    pub owner_pod: String,
    pub epoch: i64,
    pub req_id: String,
    /// Unix millis.
    pub created_at: i64,
    /// Unix millis.
    pub expires_at: i64,
}

impl LeaseMetadata {
    pub fn new(owner_pod: impl Into<String>, epoch: i64, req_id: impl Into<String>, created_at: i64, expires_at: i64) -> Self {
        Self {
            owner_pod: owner_pod.into(),
            epoch,
            req_id: req_id.into(),
            created_at,
            expires_at,
        }
    }

    /// The stable, deterministic wire encoding used as the CAS witness.
    pub fn to_bytes(&self) -> Vec<u8> {
        // serde_json preserves declared field order for struct serialization,
        // so this is byte-stable across calls for equal values.
        serde_json::to_vec(self).expect("LeaseMetadata serialization is infallible")
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis > self.expires_at
    }

    pub fn is_fenced(&self, durable_epoch: i64) -> bool {
        self.epoch < durable_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_stable_across_calls() {
        let meta = LeaseMetadata::new("node-a", 7, "req-1", 1_000, 16_000);
        assert_eq!(meta.to_bytes(), meta.to_bytes());
    }

    #[test]
    fn round_trips_through_bytes() {
        let meta = LeaseMetadata::new("node-a", 7, "req-1", 1_000, 16_000);
        let decoded = LeaseMetadata::from_bytes(&meta.to_bytes()).unwrap();
        assert_eq!(meta, decoded);
    }

    #[test]
    fn fencing_compares_epoch_against_durable_epoch() {
        let meta = LeaseMetadata::new("node-a", 5, "req-1", 0, 1);
        assert!(meta.is_fenced(6));
        assert!(!meta.is_fenced(5));
    }
}
