use clap::Args;

use crate::state::StateError;

/// List local identities
#[derive(Args, Debug, Clone)]
pub struct List;

#[async_trait::async_trait]
impl crate::op::Op for List {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let identities = state.identities()?;
        if identities.is_empty() {
            return Ok("No identities found".to_string());
        }

        Ok(identities
            .iter()
            .map(|(name, identity)| {
                let marker = if *name == ctx.identity { "*" } else { " " };
                format!("{} {} {}", marker, identity, name)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
