use async_trait::async_trait;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::provider::{LedgerAuthority, LedgerError, StorageAddress};
use super::state::LedgerState;
use crate::content::HashWords;
use crate::crypto::PublicKey;
use crate::session::Identity;

/// In-memory ledger authority
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<RwLock<LedgerState>>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryLedgerError {
    #[error("memory ledger error: {0}")]
    Internal(String),
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError<MemoryLedgerError>> {
        self.inner.read().map_err(|e| {
            LedgerError::Provider(MemoryLedgerError::Internal(format!(
                "failed to acquire read lock: {}",
                e
            )))
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError<MemoryLedgerError>> {
        self.inner.write().map_err(|e| {
            LedgerError::Provider(MemoryLedgerError::Internal(format!(
                "failed to acquire write lock: {}",
                e
            )))
        })
    }
}

#[async_trait]
impl LedgerAuthority for MemoryLedger {
    type Error = MemoryLedgerError;

    async fn register(
        &self,
        caller: &Identity,
        public_key: &PublicKey,
    ) -> Result<StorageAddress, LedgerError<Self::Error>> {
        self.write()?.register(caller, public_key)
    }

    async fn storage(&self, caller: &Identity) -> Result<StorageAddress, LedgerError<Self::Error>> {
        self.read()?.storage(caller)
    }

    async fn public_key(&self, identity: &Identity) -> Result<PublicKey, LedgerError<Self::Error>> {
        self.read()?.public_key(identity)
    }

    async fn owner(&self, storage: StorageAddress) -> Result<Identity, LedgerError<Self::Error>> {
        self.read()?.owner(storage)
    }

    async fn size(&self, storage: StorageAddress) -> Result<u64, LedgerError<Self::Error>> {
        self.read()?.size(storage)
    }

    async fn entry_at(
        &self,
        storage: StorageAddress,
        position: u64,
    ) -> Result<(String, HashWords), LedgerError<Self::Error>> {
        self.read()?.entry_at(storage, position)
    }

    async fn get(
        &self,
        storage: StorageAddress,
        path: &str,
    ) -> Result<HashWords, LedgerError<Self::Error>> {
        self.read()?.get(storage, path)
    }

    async fn append(
        &self,
        caller: &Identity,
        storage: StorageAddress,
        path: &str,
        words: HashWords,
    ) -> Result<u64, LedgerError<Self::Error>> {
        self.write()?.append(caller, storage, path, words)
    }
}
