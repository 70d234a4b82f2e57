use std::fmt::{Debug, Display};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::HashWords;
use crate::crypto::PublicKey;
use crate::session::Identity;

/// Address of one identity's storage on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageAddress(Uuid);

impl StorageAddress {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for StorageAddress {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl Display for StorageAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError<T> {
    /// Anything the authority could not decide on, e.g. it was unreachable
    #[error("unhandled ledger provider error: {0}")]
    Provider(#[from] T),
    /// The identity has never called `register`
    #[error("identity {0} is not registered")]
    NotRegistered(Identity),
    /// The identity already owns a storage
    #[error("identity {0} is already registered at {1}")]
    AlreadyRegistered(Identity, StorageAddress),
    /// The caller may not append this path to this storage
    #[error("{caller} may not append {path} to storage owned by {owner}")]
    Unauthorized {
        caller: Identity,
        owner: Identity,
        path: String,
    },
    #[error("unknown storage {0}")]
    UnknownStorage(StorageAddress),
    #[error("position {position} out of range, storage holds {size} entries")]
    PositionOutOfRange { position: u64, size: u64 },
    #[error("path {0} not found")]
    PathNotFound(String),
}

#[async_trait]
pub trait LedgerAuthority: Send + Sync + std::fmt::Debug + Clone + 'static {
    type Error: Display + Debug + Send + Sync + 'static;

    /// Record `public_key` for `caller` and create their storage
    ///
    /// Fails with `AlreadyRegistered` if the caller already owns a storage.
    async fn register(
        &self,
        caller: &Identity,
        public_key: &PublicKey,
    ) -> Result<StorageAddress, LedgerError<Self::Error>>;

    /// Resolve the storage owned by `caller`
    ///
    /// Fails with `NotRegistered` rather than returning a default.
    async fn storage(&self, caller: &Identity) -> Result<StorageAddress, LedgerError<Self::Error>>;

    /// The public key material `identity` registered with
    async fn public_key(&self, identity: &Identity) -> Result<PublicKey, LedgerError<Self::Error>>;

    async fn owner(&self, storage: StorageAddress) -> Result<Identity, LedgerError<Self::Error>>;

    /// Number of entries committed to `storage`
    async fn size(&self, storage: StorageAddress) -> Result<u64, LedgerError<Self::Error>>;

    /// The entry committed at `position`
    ///
    /// Fails with `PositionOutOfRange` when `position >= size`.
    async fn entry_at(
        &self,
        storage: StorageAddress,
        position: u64,
    ) -> Result<(String, HashWords), LedgerError<Self::Error>>;

    /// The most recently committed reference for `path`
    async fn get(
        &self,
        storage: StorageAddress,
        path: &str,
    ) -> Result<HashWords, LedgerError<Self::Error>>;

    /// Commit a new entry and return the position the authority assigned it
    async fn append(
        &self,
        caller: &Identity,
        storage: StorageAddress,
        path: &str,
        words: HashWords,
    ) -> Result<u64, LedgerError<Self::Error>>;
}
