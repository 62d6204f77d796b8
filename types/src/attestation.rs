// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Consumed but not defined by this spec (§6): agent binary attestation is a
/// collaborator's responsibility (signing, RSA verification). Modeled here
/// only as the wire shape so the scheduler can accept it at its boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttestationClaim {
    pub node_id: String,
    pub binary_hash: String,
    pub version: String,
    /// base64-encoded signature.
    pub signature: String,
    /// Unix seconds.
    pub timestamp: i64,
}
