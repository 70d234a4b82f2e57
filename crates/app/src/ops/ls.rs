use clap::Args;
use common::coordinator::CoordinatorError;

use crate::op::ContextError;
use crate::state::StateError;

/// List an index in append order
#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Whose index to list, as a 0x identity or a local name (defaults to you)
    pub identity: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("ls failed: {0}")]
    Coordinator(#[from] CoordinatorError),
}

#[async_trait::async_trait]
impl crate::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let identity = state.resolve_identity(self.identity.as_deref().unwrap_or(&ctx.identity))?;
        let vault = ctx.vault(&state).await?;

        let entries = vault.list(&identity).await?;
        if entries.is_empty() {
            return Ok(format!("No entries for {}", identity));
        }

        Ok(entries
            .iter()
            .enumerate()
            .map(|(position, entry)| format!("{:>4}  {}  {}", position, entry.content, entry.path))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
