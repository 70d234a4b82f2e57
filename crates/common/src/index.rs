//! Per-identity, append-only index of content references
//!
//! The ledger authority is the owner of record. [`AccessIndex`] translates
//! between [`IndexEntry`] values and the fixed-width words the authority
//! stores, and keeps a best-effort copy of each identity's size for
//! presentation. That copy is refreshed from the authority after every
//! append and is never used to assign positions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::content::{decode, encode_words, ContentAddressError, ContentIdentifier};
use crate::crypto::PublicKey;
use crate::ledger::{LedgerAuthority, LedgerError, StorageAddress};
use crate::session::Identity;

/// One committed `(path, content)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub content: ContentIdentifier,
}

impl IndexEntry {
    pub fn new(path: impl Into<String>, content: ContentIdentifier) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }
}

/// What a failed read was looking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Position(u64),
    Path(String),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Position(position) => write!(f, "position {}", position),
            Lookup::Path(path) => write!(f, "path {}", path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("append rejected: {reason}")]
    AppendRejected { reason: String },
    #[error("{lookup} not found in index of {identity} ({size} entries)")]
    OutOfRange {
        identity: Identity,
        lookup: Lookup,
        size: u64,
    },
    #[error("identity {0} is not registered")]
    NotRegistered(Identity),
    #[error("identity {0} is already registered")]
    AlreadyRegistered(Identity),
    /// The authority failed for a reason unrelated to the request itself
    #[error("ledger authority error: {0}")]
    Authority(String),
    #[error(transparent)]
    Address(#[from] ContentAddressError),
}

impl IndexError {
    fn from_ledger<T: fmt::Display>(err: LedgerError<T>) -> Self {
        match err {
            LedgerError::NotRegistered(identity) => IndexError::NotRegistered(identity),
            LedgerError::AlreadyRegistered(identity, _) => IndexError::AlreadyRegistered(identity),
            e @ LedgerError::Unauthorized { .. } => IndexError::AppendRejected {
                reason: e.to_string(),
            },
            e => IndexError::Authority(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessIndex<L: LedgerAuthority> {
    ledger: L,
    sizes: Arc<RwLock<HashMap<Identity, u64>>>,
}

impl<L: LedgerAuthority> AccessIndex<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            sizes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Create the storage for `identity` and record its public key
    pub async fn register(
        &self,
        identity: &Identity,
        public_key: &PublicKey,
    ) -> Result<StorageAddress, IndexError> {
        let storage = self
            .ledger
            .register(identity, public_key)
            .await
            .map_err(IndexError::from_ledger)?;
        self.sizes.write().insert(*identity, 0);
        tracing::info!("registered {} at storage {}", identity, storage);
        Ok(storage)
    }

    pub async fn storage(&self, identity: &Identity) -> Result<StorageAddress, IndexError> {
        self.ledger
            .storage(identity)
            .await
            .map_err(IndexError::from_ledger)
    }

    pub async fn public_key(&self, identity: &Identity) -> Result<PublicKey, IndexError> {
        self.ledger
            .public_key(identity)
            .await
            .map_err(IndexError::from_ledger)
    }

    /// Append `entry` to the caller's own index
    pub async fn append(&self, identity: &Identity, entry: &IndexEntry) -> Result<u64, IndexError> {
        self.append_as(identity, identity, entry).await
    }

    /// Append `entry` to `owner`'s index on behalf of `caller`
    ///
    /// Whether `caller` may write there is decided by the authority alone.
    /// The returned position is the one the authority committed.
    pub async fn append_as(
        &self,
        caller: &Identity,
        owner: &Identity,
        entry: &IndexEntry,
    ) -> Result<u64, IndexError> {
        let words = decode(&entry.content)?;
        let storage = self.storage(owner).await?;
        let position = self
            .ledger
            .append(caller, storage, &entry.path, words)
            .await
            .map_err(IndexError::from_ledger)?;
        tracing::debug!(
            "appended {} -> {} at position {} of {}",
            entry.path,
            entry.content,
            position,
            owner
        );

        match self.ledger.size(storage).await {
            Ok(size) => {
                self.sizes.write().insert(*owner, size);
            }
            Err(e) => {
                tracing::warn!("failed to refresh index size of {}: {}", owner, e);
                self.sizes.write().remove(owner);
            }
        }
        Ok(position)
    }

    /// Number of entries in `identity`'s index, `0` if it was never registered
    pub async fn size(&self, identity: &Identity) -> Result<u64, IndexError> {
        let storage = match self.ledger.storage(identity).await {
            Ok(storage) => storage,
            Err(LedgerError::NotRegistered(_)) => return Ok(0),
            Err(e) => return Err(IndexError::from_ledger(e)),
        };
        let size = self
            .ledger
            .size(storage)
            .await
            .map_err(IndexError::from_ledger)?;
        self.sizes.write().insert(*identity, size);
        Ok(size)
    }

    /// Last size observed for `identity` without asking the authority
    pub fn cached_size(&self, identity: &Identity) -> Option<u64> {
        self.sizes.read().get(identity).copied()
    }

    pub async fn get(&self, identity: &Identity, position: u64) -> Result<IndexEntry, IndexError> {
        let storage = match self.ledger.storage(identity).await {
            Ok(storage) => storage,
            Err(LedgerError::NotRegistered(_)) => {
                return Err(IndexError::OutOfRange {
                    identity: *identity,
                    lookup: Lookup::Position(position),
                    size: 0,
                })
            }
            Err(e) => return Err(IndexError::from_ledger(e)),
        };

        match self.ledger.entry_at(storage, position).await {
            Ok((path, words)) => Ok(IndexEntry::new(path, encode_words(&words)?)),
            Err(LedgerError::PositionOutOfRange { size, .. }) => Err(IndexError::OutOfRange {
                identity: *identity,
                lookup: Lookup::Position(position),
                size,
            }),
            Err(e) => Err(IndexError::from_ledger(e)),
        }
    }

    /// Latest entry committed for `path`
    pub async fn lookup(&self, identity: &Identity, path: &str) -> Result<IndexEntry, IndexError> {
        let miss = |size| IndexError::OutOfRange {
            identity: *identity,
            lookup: Lookup::Path(path.to_string()),
            size,
        };

        let storage = match self.ledger.storage(identity).await {
            Ok(storage) => storage,
            Err(LedgerError::NotRegistered(_)) => return Err(miss(0)),
            Err(e) => return Err(IndexError::from_ledger(e)),
        };

        match self.ledger.get(storage, path).await {
            Ok(words) => Ok(IndexEntry::new(path, encode_words(&words)?)),
            Err(LedgerError::PathNotFound(_)) => {
                let size = self
                    .ledger
                    .size(storage)
                    .await
                    .map_err(IndexError::from_ledger)?;
                Err(miss(size))
            }
            Err(e) => Err(IndexError::from_ledger(e)),
        }
    }

    /// Every entry of `identity`'s index in append order
    pub async fn entries(&self, identity: &Identity) -> Result<Vec<IndexEntry>, IndexError> {
        let size = self.size(identity).await?;
        let mut entries = Vec::with_capacity(size as usize);
        for position in 0..size {
            entries.push(self.get(identity, position).await?);
        }
        Ok(entries)
    }
}
