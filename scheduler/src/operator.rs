// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Operator control surface (§6): the seam a future HTTP/CLI layer would
//! call to flip modes and read a point-in-time snapshot. No transport is
//! implemented here — per spec.md §1 the API surface is out of scope — this
//! is purely the trait + data shape a transport would sit on top of.

use serde::{Deserialize, Serialize};

use fluxforge_types::{AdmissionMode, CircuitState, RuntimeMode};

/// The exact JSON shape spec.md names in §6.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OperatorSnapshot {
    pub queue_depth: usize,
    pub active_tasks: usize,
    pub worker_saturation: f64,
    pub circuit_breaker_state: CircuitState,
    pub admission_mode: AdmissionMode,
    pub runtime_mode: RuntimeMode,
    pub is_leader: bool,
    pub current_epoch: i64,
    pub leader_transitions: u64,
    pub node_id: String,
}

pub trait OperatorControl: Send + Sync {
    fn set_runtime_mode(&self, mode: RuntimeMode);
    fn set_admission_mode(&self, mode: AdmissionMode);
    fn snapshot(&self) -> OperatorSnapshot;
}
