//! Shared test utilities for coordinator integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::blobs::{BlobError, BlobStore, IrohBlobStore};
use common::content::{ContentIdentifier, HashWords};
use common::coordinator::StorageCoordinator;
use common::crypto::{PublicKey, SecretKey};
use common::ledger::{
    FileLedger, LedgerAuthority, LedgerError, MemoryLedger, MemoryLedgerError, StorageAddress,
};
use common::session::{Identity, Session};
use tempfile::TempDir;

pub fn session() -> Session {
    Session::from_secret(SecretKey::generate().unwrap())
}

pub fn memory_coordinator() -> StorageCoordinator<MemoryLedger, IrohBlobStore> {
    StorageCoordinator::new(MemoryLedger::new(), IrohBlobStore::memory())
}

/// Coordinator over a file ledger and a filesystem blob store in a temp dir
pub async fn fs_coordinator() -> (StorageCoordinator<FileLedger, IrohBlobStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let ledger = FileLedger::open(temp_dir.path().join("ledger.json")).unwrap();
    let blobs = IrohBlobStore::fs(&temp_dir.path().join("blobs"))
        .await
        .unwrap();
    (StorageCoordinator::new(ledger, blobs), temp_dir)
}

#[derive(Debug, thiserror::Error)]
pub enum FaultError {
    #[error("injected fault")]
    Injected,
    #[error(transparent)]
    Memory(#[from] MemoryLedgerError),
}

/// Ledger whose appends can be made to fail like an unreachable authority
#[derive(Debug, Clone, Default)]
pub struct FaultyLedger {
    inner: MemoryLedger,
    fail_appends: Arc<AtomicBool>,
}

impl FaultyLedger {
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

fn lift(err: LedgerError<MemoryLedgerError>) -> LedgerError<FaultError> {
    match err {
        LedgerError::Provider(e) => LedgerError::Provider(e.into()),
        LedgerError::NotRegistered(id) => LedgerError::NotRegistered(id),
        LedgerError::AlreadyRegistered(id, storage) => LedgerError::AlreadyRegistered(id, storage),
        LedgerError::Unauthorized {
            caller,
            owner,
            path,
        } => LedgerError::Unauthorized {
            caller,
            owner,
            path,
        },
        LedgerError::UnknownStorage(storage) => LedgerError::UnknownStorage(storage),
        LedgerError::PositionOutOfRange { position, size } => {
            LedgerError::PositionOutOfRange { position, size }
        }
        LedgerError::PathNotFound(path) => LedgerError::PathNotFound(path),
    }
}

#[async_trait]
impl LedgerAuthority for FaultyLedger {
    type Error = FaultError;

    async fn register(
        &self,
        caller: &Identity,
        public_key: &PublicKey,
    ) -> Result<StorageAddress, LedgerError<Self::Error>> {
        self.inner.register(caller, public_key).await.map_err(lift)
    }

    async fn storage(&self, caller: &Identity) -> Result<StorageAddress, LedgerError<Self::Error>> {
        self.inner.storage(caller).await.map_err(lift)
    }

    async fn public_key(&self, identity: &Identity) -> Result<PublicKey, LedgerError<Self::Error>> {
        self.inner.public_key(identity).await.map_err(lift)
    }

    async fn owner(&self, storage: StorageAddress) -> Result<Identity, LedgerError<Self::Error>> {
        self.inner.owner(storage).await.map_err(lift)
    }

    async fn size(&self, storage: StorageAddress) -> Result<u64, LedgerError<Self::Error>> {
        self.inner.size(storage).await.map_err(lift)
    }

    async fn entry_at(
        &self,
        storage: StorageAddress,
        position: u64,
    ) -> Result<(String, HashWords), LedgerError<Self::Error>> {
        self.inner.entry_at(storage, position).await.map_err(lift)
    }

    async fn get(
        &self,
        storage: StorageAddress,
        path: &str,
    ) -> Result<HashWords, LedgerError<Self::Error>> {
        self.inner.get(storage, path).await.map_err(lift)
    }

    async fn append(
        &self,
        caller: &Identity,
        storage: StorageAddress,
        path: &str,
        words: HashWords,
    ) -> Result<u64, LedgerError<Self::Error>> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(LedgerError::Provider(FaultError::Injected));
        }
        self.inner
            .append(caller, storage, path, words)
            .await
            .map_err(lift)
    }
}

/// Blob store whose reads can be made to fail at the transport
#[derive(Debug, Clone)]
pub struct FaultyBlobs {
    inner: IrohBlobStore,
    fail_gets: Arc<AtomicBool>,
}

impl FaultyBlobs {
    pub fn new(inner: IrohBlobStore) -> Self {
        Self {
            inner,
            fail_gets: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FaultyBlobs {
    async fn put(&self, data: Vec<u8>) -> Result<ContentIdentifier, BlobError> {
        self.inner.put(data).await
    }

    async fn get(&self, id: &ContentIdentifier) -> Result<Bytes, BlobError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(BlobError::Network("connection reset".to_string()));
        }
        self.inner.get(id).await
    }

    async fn has(&self, id: &ContentIdentifier) -> Result<bool, BlobError> {
        self.inner.has(id).await
    }
}
