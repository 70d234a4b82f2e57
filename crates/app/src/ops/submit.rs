use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use common::coordinator::CoordinatorError;

use crate::op::{track, ContextError};
use crate::state::StateError;

/// Encrypt a local file and add it to your index
#[derive(Args, Debug, Clone)]
pub struct Submit {
    /// Absolute path to store the file under, e.g. /docs/report.pdf
    pub path: String,

    /// Local file to read
    pub file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("submit failed: {0}")]
    Operation(#[from] Arc<CoordinatorError>),
}

#[async_trait::async_trait]
impl crate::op::Op for Submit {
    type Error = SubmitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let session = ctx.session(&state)?;
        let vault = ctx.vault(&state).await?;

        let data = tokio::fs::read(&self.file)
            .await
            .map_err(|e| SubmitError::Read(self.file.clone(), e))?;
        let size = data.len();

        let position = track(vault.spawn_submit(session, self.path.clone(), data)).await?;
        Ok(format!(
            "Submitted {} ({} bytes) at position {}",
            self.path, size, position
        ))
    }
}
