// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Admission-rejected reasons (§7): user-visible, retriable at a higher
/// layer, never fatal. `Submit` returns exactly one of these on rejection
/// and never a generic error — the caller is expected to match on it.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum AdmissionError {
    #[error("not_leader")]
    NotLeader,
    #[error("freeze")]
    Freeze,
    #[error("drain")]
    Drain,
    #[error("circuit_open")]
    CircuitOpen,
    #[error("read_only_mode")]
    ReadOnlyMode,
    #[error("degraded_mode")]
    DegradedMode,
    #[error("queue_full")]
    QueueFull,
    #[error("wrong_shard")]
    WrongShard,
}

impl AdmissionError {
    /// The categorized reason string used in Timeline metadata and operator
    /// surfaces — identical to the `Display` impl, named explicitly so call
    /// sites don't rely on `Display` formatting as an implicit contract.
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::NotLeader => "not_leader",
            AdmissionError::Freeze => "freeze",
            AdmissionError::Drain => "drain",
            AdmissionError::CircuitOpen => "circuit_open",
            AdmissionError::ReadOnlyMode => "read_only_mode",
            AdmissionError::DegradedMode => "degraded_mode",
            AdmissionError::QueueFull => "queue_full",
            AdmissionError::WrongShard => "wrong_shard",
        }
    }
}

/// Reconciliation/dispatch aborted because leadership changed mid-flight
/// (§7 "Epoch abort"). Safe to drop on the floor — another leader will
/// retry the work.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ReconcileAbort {
    #[error("epoch abort: local epoch {local} no longer matches leader epoch {observed}")]
    EpochAbort { local: i64, observed: i64 },
    #[error("not leader, skipping reconciliation pass")]
    NotLeader,
}
