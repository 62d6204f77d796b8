// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Election, admission scheduling, degraded-mode caching and reconciliation:
//! every background component a FluxForge node runs, wired around the
//! collaborator traits defined in `fluxforge-coordinator`.

pub mod agent_monitor;
pub mod circuit_breaker;
pub mod degraded;
pub mod elector;
pub mod health;
pub mod janitor;
pub mod operator;
pub mod queue;
pub mod rate_limiter;
pub mod reconciliation;
pub mod scheduler;
pub mod timeline;

pub use agent_monitor::AgentMonitor;
pub use circuit_breaker::CircuitBreaker;
pub use degraded::DegradedMode;
pub use elector::{ElectionEvent, LeaderElector};
pub use health::HealthRegistry;
pub use janitor::LockJanitor;
pub use operator::{OperatorControl, OperatorSnapshot};
pub use queue::PriorityQueue;
pub use rate_limiter::KeyedRateLimiter;
pub use reconciliation::{ReconciliationCoordinator, ReconciliationOutcome};
pub use scheduler::Scheduler;
pub use timeline::Timeline;
