// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

use tokio_util::sync::CancellationToken;

/// Carries the epoch a reconciliation or scheduling action was admitted
/// under, plus a cancellation signal the elector trips the moment this
/// node steps down or observes a higher epoch (§4.H, §4.M). Collaborators
/// should check `is_current()` before any durable write and `cancelled()`
/// for cooperative early exit out of long-running work.
#[derive(Clone, Debug)]
pub struct FencedContext {
    epoch: i64,
    token: CancellationToken,
}

impl FencedContext {
    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    /// True while the fencing handle that created this context has not
    /// been revoked.
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Resolves once this context has been fenced off, for use in
    /// `tokio::select!` alongside reconciliation work.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// The write side of a `FencedContext`, held by the leader elector. Calling
/// `revoke` fences off every context handed out under the current epoch.
#[derive(Clone, Debug)]
pub struct FencingHandle {
    token: CancellationToken,
}

impl FencingHandle {
    pub fn revoke(&self) {
        self.token.cancel();
    }
}

/// Creates a fresh fenced-context pair for `epoch`. The elector calls this
/// once per successful acquisition/renewal and keeps the returned
/// `FencingHandle` to revoke it on step-down or epoch loss.
pub fn new_fenced_context(epoch: i64) -> (FencedContext, FencingHandle) {
    let token = CancellationToken::new();
    (
        FencedContext {
            epoch,
            token: token.clone(),
        },
        FencingHandle { token },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoke_cancels_every_clone() {
        let (ctx, handle) = new_fenced_context(7);
        assert!(ctx.is_current());
        let ctx2 = ctx.clone();
        handle.revoke();
        assert!(!ctx.is_current());
        assert!(!ctx2.is_current());
        ctx.cancelled().await;
    }

    #[test]
    fn carries_the_issuing_epoch() {
        let (ctx, _handle) = new_fenced_context(42);
        assert_eq!(ctx.epoch(), 42);
    }
}
