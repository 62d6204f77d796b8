// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One write buffered while the ephemeral store was unavailable (§4.L).
///
/// Within a single degraded-mode instance, `version` is strictly increasing
/// and `reconciled` only ever flips false -> true.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingWrite {
    pub key: String,
    pub value: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub ttl: Duration,
    pub version: u64,
    pub reconciled: bool,
}

impl PendingWrite {
    pub fn new(key: impl Into<String>, value: Vec<u8>, ttl: Duration, version: u64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp: Utc::now(),
            ttl,
            version,
            reconciled: false,
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.timestamp
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
