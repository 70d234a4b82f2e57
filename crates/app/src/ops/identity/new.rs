use clap::Args;

use crate::state::StateError;

/// Generate a key for a new local identity
#[derive(Args, Debug, Clone)]
pub struct New {
    /// Name to store the key under
    pub name: String,
}

#[async_trait::async_trait]
impl crate::op::Op for New {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let identity = state.create_identity(&self.name)?;
        Ok(format!("Created identity {}: {}", self.name, identity))
    }
}
