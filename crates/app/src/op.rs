use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::blobs::{BlobError, IrohBlobStore};
use common::coordinator::{CoordinatorError, OperationHandle, OperationStatus, StorageCoordinator};
use common::ledger::{FileLedger, FileLedgerError};
use common::session::Session;

use crate::state::{AppState, BlobStoreConfig, StateError};

pub type Vault = StorageCoordinator<FileLedger, IrohBlobStore>;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("failed to open ledger: {0}")]
    Ledger(#[from] FileLedgerError),
    #[error("failed to open blob store: {0}")]
    Blobs(#[from] BlobError),
}

#[derive(Clone, Debug)]
pub struct OpContext {
    /// Optional custom config path (defaults to ~/.vault)
    pub config_path: Option<PathBuf>,
    /// Name of the local identity commands act as
    pub identity: String,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>, identity: String) -> Self {
        Self {
            config_path,
            identity,
        }
    }

    pub fn state(&self) -> Result<AppState, StateError> {
        AppState::load(self.config_path.clone())
    }

    /// Session for the acting identity
    pub fn session(&self, state: &AppState) -> Result<Session, StateError> {
        state.session(&self.identity)
    }

    /// Wire a coordinator to the vault directory's ledger and blob store
    pub async fn vault(&self, state: &AppState) -> Result<Vault, ContextError> {
        let ledger = FileLedger::open(&state.ledger_path)?;
        let blobs = match state.config.blob_store {
            BlobStoreConfig::Fs => IrohBlobStore::fs(&state.blobs_path).await?,
            BlobStoreConfig::Memory => IrohBlobStore::memory(),
        };
        let blobs = blobs.with_fetch_timeout(Duration::from_secs(state.config.fetch_timeout_secs));
        Ok(StorageCoordinator::new(ledger, blobs))
    }
}

/// Wait for an operation, logging each step it reports
pub async fn track<T>(handle: OperationHandle<T>) -> Result<T, Arc<CoordinatorError>>
where
    T: Clone + Send + Sync + 'static,
{
    let mut events = handle.subscribe();
    let watcher = tokio::spawn(async move {
        while events.changed().await.is_ok() {
            if let OperationStatus::Pending(step) = &*events.borrow_and_update() {
                tracing::info!("{}", step);
            }
        }
    });
    let outcome = handle.outcome().await;
    watcher.abort();
    outcome
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
