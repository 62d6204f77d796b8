// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Node configuration for FluxForge, following the teacher's layout of one
//! `#[derive(Serialize, Deserialize)]` struct per component under
//! `config::config::*`, aggregated into a single `NodeConfig`.

pub mod config;
mod utils;

pub use config::{
    AgentMonitorConfig, CircuitBreakerConfig, DegradedModeConfig, ElectionConfig, JanitorConfig, Level, LoggerConfig,
    NodeConfig, RateLimiterConfig, SchedulerConfig, CHANNEL_SIZE,
};
