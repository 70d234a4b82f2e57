use clap::Args;
use common::coordinator::CoordinatorError;

use crate::op::ContextError;
use crate::state::StateError;

/// Register the acting identity with the ledger
#[derive(Args, Debug, Clone)]
pub struct Register;

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("register failed: {0}")]
    Coordinator(#[from] CoordinatorError),
}

#[async_trait::async_trait]
impl crate::op::Op for Register {
    type Error = RegisterError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let session = ctx.session(&state)?;
        let vault = ctx.vault(&state).await?;

        let storage = vault.register(&session).await?;
        Ok(format!(
            "Registered {} ({}) at storage {}",
            ctx.identity,
            session.identity(),
            storage
        ))
    }
}
