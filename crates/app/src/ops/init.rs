use clap::Args;

use crate::state::{AppConfig, AppState, BlobStoreConfig, DEFAULT_IDENTITY};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Default log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Seconds to wait for a blob before reporting it missing
    #[arg(long, default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Blob store backend
    #[arg(long, value_enum, default_value_t = BlobStoreConfig::Fs)]
    pub blob_store: BlobStoreConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            log_level: self.log_level.clone(),
            fetch_timeout_secs: self.fetch_timeout_secs,
            blob_store: self.blob_store,
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        let identity = state.resolve_identity(DEFAULT_IDENTITY)?;

        let output = format!(
            "Initialized vault directory at: {}\n\
             - Ledger: {}\n\
             - Keys: {}\n\
             - Blobs: {} ({:?})\n\
             - Config: {}\n\
             - Default identity: {}",
            state.vault_dir.display(),
            state.ledger_path.display(),
            state.keys_path.display(),
            state.blobs_path.display(),
            state.config.blob_store,
            state.config_path.display(),
            identity
        );

        Ok(output)
    }
}
