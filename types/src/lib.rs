// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared data model for the FluxForge scheduling and coordination core.
//!
//! Every type here is a plain value type: no I/O, no locking, no async.
//! Behavior lives in `fluxforge-coordinator` (collaborator contracts) and
//! `fluxforge-scheduler` (the components that operate on these values).

pub mod agent;
pub mod attestation;
pub mod cache;
pub mod error;
pub mod health;
pub mod lease;
pub mod modes;
pub mod pending_write;
pub mod shard;
pub mod state;
pub mod task;
pub mod timeline;

pub use agent::{Agent, AgentStatus};
pub use attestation::AttestationClaim;
pub use cache::CacheEntry;
pub use error::{AdmissionError, ReconcileAbort};
pub use health::{HealthSignal, NodeHealth, Tier};
pub use lease::LeaseMetadata;
pub use modes::{AdmissionMode, CircuitState, RuntimeMode};
pub use pending_write::PendingWrite;
pub use shard::{fnv32, owns_shard};
pub use state::DesiredState;
pub use task::ReconciliationTask;
pub use timeline::{ReconcileEvent, Stage};
