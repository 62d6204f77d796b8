// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

mod reconciler;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fluxforge_config::NodeConfig;
use fluxforge_coordinator::memory::{InMemoryDurableStore, InMemoryEphemeralCoordinator};
use fluxforge_coordinator::{DurableEpochStore, EphemeralCoordinator, Reconciler};
use fluxforge_scheduler::{
    AgentMonitor, CircuitBreaker, DegradedMode, HealthRegistry, KeyedRateLimiter, LeaderElector, LockJanitor,
    OperatorControl, ReconciliationCoordinator, Scheduler, Timeline,
};
use fluxforge_types::{AdmissionMode, RuntimeMode};

use reconciler::LoggingReconciler;

/// Start a FluxForge control-plane node.
#[derive(Parser, Debug)]
#[clap(name = "fluxforge-node", about = "FluxForge control-plane node")]
struct Cli {
    /// Path to a YAML node config. Falls back to `NodeConfig::default()` if omitted.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Overrides `node_id` from the loaded config.
    #[clap(long)]
    node_id: Option<String>,

    /// Starting admission mode: normal, drain, or freeze.
    #[clap(long)]
    admission_mode: Option<String>,

    /// Starting runtime mode: normal, degraded, read_only, or draining.
    #[clap(long)]
    runtime_mode: Option<String>,

    /// Overrides `scheduler.shard_index` from the loaded config.
    #[clap(long)]
    shard_index: Option<u32>,

    /// Overrides `scheduler.shard_count` from the loaded config.
    #[clap(long)]
    shard_count: Option<u32>,
}

fn parse_admission_mode(s: &str) -> anyhow::Result<AdmissionMode> {
    match s {
        "normal" => Ok(AdmissionMode::Normal),
        "drain" => Ok(AdmissionMode::Drain),
        "freeze" => Ok(AdmissionMode::Freeze),
        other => anyhow::bail!("unknown admission mode '{other}', expected normal|drain|freeze"),
    }
}

fn parse_runtime_mode(s: &str) -> anyhow::Result<RuntimeMode> {
    match s {
        "normal" => Ok(RuntimeMode::Normal),
        "degraded" => Ok(RuntimeMode::Degraded),
        "read_only" => Ok(RuntimeMode::ReadOnly),
        "draining" => Ok(RuntimeMode::Draining),
        other => anyhow::bail!("unknown runtime mode '{other}', expected normal|degraded|read_only|draining"),
    }
}

fn init_logging(config: &fluxforge_config::LoggerConfig) {
    if config.enable_backtrace && std::env::var_os("RUST_BACKTRACE").is_none() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_tracing_level().to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
        if config.election.owner_id == "unassigned-owner" {
            config.election.owner_id = config.node_id.clone();
        }
    }
    if let Some(shard_index) = cli.shard_index {
        config.scheduler.shard_index = shard_index;
    }
    if let Some(shard_count) = cli.shard_count {
        config.scheduler.shard_count = shard_count;
    }

    init_logging(&config.logger);
    info!(node_id = %config.node_id, "starting fluxforge node");

    let ephemeral: Arc<dyn EphemeralCoordinator> = Arc::new(InMemoryEphemeralCoordinator::new());
    let durable: Arc<dyn DurableEpochStore> = Arc::new(InMemoryDurableStore::new());
    let reconciler: Arc<dyn Reconciler> = Arc::new(LoggingReconciler);

    let elector = LeaderElector::new(config.election.clone(), ephemeral.clone(), durable.clone());
    let janitor = Arc::new(LockJanitor::new(
        config.janitor.clone(),
        config.election.resource.clone(),
        ephemeral.clone(),
        durable.clone(),
    ));
    let agent_monitor = Arc::new(AgentMonitor::new(config.agent_monitor.clone(), durable.clone()));
    let degraded = Arc::new(DegradedMode::new(config.degraded_mode.clone()));
    let reconciliation = Arc::new(ReconciliationCoordinator::new(
        config.degraded_mode.clone(),
        elector.clone(),
        ephemeral.clone(),
        degraded.clone(),
    ));

    let node_limiter = Arc::new(KeyedRateLimiter::new(config.rate_limiter.node_rps, config.rate_limiter.node_burst));
    let tenant_limiter = Arc::new(KeyedRateLimiter::new(config.rate_limiter.tenant_rps, config.rate_limiter.tenant_burst));
    let health = HealthRegistry::new(node_limiter.clone());
    let breaker = CircuitBreaker::new(config.circuit_breaker.clone());
    let timeline = Timeline::new(4096);
    let executor = fluxforge_bounded_executor::BoundedExecutor::new_on_current(config.scheduler.max_concurrency);

    let scheduler = Scheduler::new(
        config.scheduler.clone(),
        config.node_id.clone(),
        config.rate_limiter.tenant_min_penalty,
        node_limiter,
        tenant_limiter,
        health,
        breaker,
        timeline,
        executor,
        elector.clone(),
        reconciler,
        durable.clone(),
    );

    if let Some(mode) = cli.admission_mode.as_deref() {
        scheduler.set_admission_mode(parse_admission_mode(mode)?);
    }
    if let Some(mode) = cli.runtime_mode.as_deref() {
        scheduler.set_runtime_mode(parse_runtime_mode(mode)?);
    }

    let shutdown = CancellationToken::new();

    let elector_handle = tokio::spawn({
        let elector = elector.clone();
        let shutdown = shutdown.clone();
        async move { elector.run(shutdown).await }
    });
    let janitor_handle = tokio::spawn({
        let janitor = janitor.clone();
        let shutdown = shutdown.clone();
        async move { janitor.run(shutdown).await }
    });
    let agent_monitor_handle = tokio::spawn({
        let agent_monitor = agent_monitor.clone();
        let shutdown = shutdown.clone();
        async move { agent_monitor.run(shutdown).await }
    });
    let reconciliation_handle = tokio::spawn({
        let reconciliation = reconciliation.clone();
        let shutdown = shutdown.clone();
        async move { reconciliation.run(shutdown).await }
    });
    let scheduler_handle = tokio::spawn({
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        async move { scheduler.run(shutdown).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining background tasks");
    shutdown.cancel();

    let _ = tokio::join!(
        elector_handle,
        janitor_handle,
        agent_monitor_handle,
        reconciliation_handle,
        scheduler_handle,
    );
    info!("fluxforge node stopped");
    Ok(())
}
