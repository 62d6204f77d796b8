// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Collaborator contracts for the FluxForge node: the ephemeral lock/lease
//! store, the durable epoch and state store, and the reconciler each node
//! plugs in. Production nodes back these with an external coordination
//! service; the in-memory implementations here exist for local wiring and
//! for the test suites of `fluxforge-scheduler`.

pub mod durable;
pub mod ephemeral;
pub mod fencing;
pub mod memory;
pub mod reconciler;

pub use durable::DurableEpochStore;
pub use ephemeral::{EphemeralCoordinator, VersionedValue};
pub use fencing::{FencedContext, FencingHandle};
pub use memory::{InMemoryDurableStore, InMemoryEphemeralCoordinator};
pub use reconciler::Reconciler;
