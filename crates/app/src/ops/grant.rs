use clap::Args;
use common::coordinator::CoordinatorError;

use crate::op::ContextError;
use crate::state::StateError;

/// Print the re-encryption grant you would issue to an identity
#[derive(Args, Debug, Clone)]
pub struct Grant {
    /// Grantee, as a 0x identity or the name of a local identity
    pub grantee: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("grant failed: {0}")]
    Coordinator(#[from] CoordinatorError),
}

#[async_trait::async_trait]
impl crate::op::Op for Grant {
    type Error = GrantError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let session = ctx.session(&state)?;
        let grantee = state.resolve_identity(&self.grantee)?;
        let vault = ctx.vault(&state).await?;

        let grant = vault.grant(&session, &grantee).await?;
        Ok(grant.to_hex())
    }
}
