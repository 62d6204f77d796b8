// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! The default `Reconciler` a freshly-started node wires in. Real
//! deployments replace this with whatever actually drives a node towards its
//! desired state (§1: that control loop is out of scope here) — this one
//! only proves the fencing contract is respected.

use async_trait::async_trait;
use tracing::info;

use fluxforge_coordinator::{FencedContext, Reconciler};

pub struct LoggingReconciler;

#[async_trait]
impl Reconciler for LoggingReconciler {
    async fn reconcile(&self, ctx: FencedContext, tenant_id: &str, state_id: &str) -> anyhow::Result<()> {
        info!(epoch = ctx.epoch(), tenant_id, state_id, "reconciling (default no-op reconciler)");
        Ok(())
    }
}
