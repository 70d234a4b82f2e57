use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use common::coordinator::CoordinatorError;

use crate::op::{track, ContextError};
use crate::state::StateError;

/// Fetch and decrypt an entry of your index
#[derive(Args, Debug, Clone)]
pub struct Retrieve {
    /// Path of the entry; the latest entry for the path is read
    #[arg(required_unless_present = "position", conflicts_with = "position")]
    pub path: Option<String>,

    /// Read the entry at this index position instead
    #[arg(long)]
    pub position: Option<u64>,

    /// Write the plaintext here instead of printing it
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("either a path or --position is required")]
    MissingTarget,
    #[error("failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("retrieve failed: {0}")]
    Operation(#[from] Arc<CoordinatorError>),
}

/// Which entry to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Path(String),
    Position(u64),
}

impl Retrieve {
    pub fn target(&self) -> Result<Target, RetrieveError> {
        match (&self.path, self.position) {
            (_, Some(position)) => Ok(Target::Position(position)),
            (Some(path), None) => Ok(Target::Path(path.clone())),
            (None, None) => Err(RetrieveError::MissingTarget),
        }
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Retrieve {
    type Error = RetrieveError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let target = self.target()?;
        let state = ctx.state()?;
        let session = ctx.session(&state)?;
        let vault = ctx.vault(&state).await?;

        let handle = match target {
            Target::Position(position) => vault.spawn_retrieve_at(session, position),
            Target::Path(path) => vault.spawn_retrieve(session, path),
        };
        let plaintext = track(handle).await?;

        match &self.out {
            Some(out) => {
                tokio::fs::write(out, &plaintext)
                    .await
                    .map_err(|e| RetrieveError::Write(out.clone(), e))?;
                Ok(format!("Wrote {} bytes to {}", plaintext.len(), out.display()))
            }
            None => Ok(String::from_utf8_lossy(&plaintext).into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieve(path: Option<&str>, position: Option<u64>) -> Retrieve {
        Retrieve {
            path: path.map(str::to_string),
            position,
            out: None,
        }
    }

    #[test]
    fn test_target_requires_path_or_position() {
        assert!(matches!(
            retrieve(None, None).target(),
            Err(RetrieveError::MissingTarget)
        ));
        assert_eq!(
            retrieve(Some("/doc"), None).target().unwrap(),
            Target::Path("/doc".to_string())
        );
        assert_eq!(retrieve(None, Some(3)).target().unwrap(), Target::Position(3));
    }
}
