// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::fencing::FencedContext;

/// The per-tenant reconciliation logic a node plugs in. `reconcile` is
/// handed a `FencedContext` so it can observe cancellation the instant the
/// calling node loses its lease or epoch, without polling for it itself.
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(&self, ctx: FencedContext, tenant_id: &str, state_id: &str) -> anyhow::Result<()>;
}
