// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};

/// An entry in the bounded local cache (§4.L). `last_access` drives the LRU
/// eviction policy and is refreshed by `GetFromCache`.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: Vec<u8>,
    pub last_access: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            last_access: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }
}
