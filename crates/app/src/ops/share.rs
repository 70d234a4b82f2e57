use std::sync::Arc;

use clap::Args;
use common::coordinator::CoordinatorError;

use crate::op::{track, ContextError};
use crate::state::StateError;

/// Re-encrypt one of your entries for another identity
#[derive(Args, Debug, Clone)]
pub struct Share {
    /// Path of the entry to share
    pub path: String,

    /// Grantee, as a 0x identity or the name of a local identity
    pub grantee: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("share failed: {0}")]
    Operation(#[from] Arc<CoordinatorError>),
}

#[async_trait::async_trait]
impl crate::op::Op for Share {
    type Error = ShareError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let session = ctx.session(&state)?;
        let grantee = state.resolve_identity(&self.grantee)?;
        let vault = ctx.vault(&state).await?;

        let shared = track(vault.spawn_share(session, grantee, self.path.clone())).await?;
        Ok(format!(
            "Shared {} with {} as {} (position {})",
            self.path, grantee, shared.path, shared.position
        ))
    }
}
