// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Operator kill-switch, orthogonal to `RuntimeMode` (§4.K, glossary).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    Normal,
    Drain,
    Freeze,
}

impl Default for AdmissionMode {
    fn default() -> Self {
        AdmissionMode::Normal
    }
}

/// Self-protection state (§4.K, glossary).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    Normal,
    Degraded,
    ReadOnly,
    Draining,
}

impl Default for RuntimeMode {
    fn default() -> Self {
        RuntimeMode::Normal
    }
}

/// Circuit breaker state (§4.F).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl Default for CircuitState {
    fn default() -> Self {
        CircuitState::Closed
    }
}
