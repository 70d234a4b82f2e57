use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::delivery_prefix;
use super::provider::{LedgerError, StorageAddress};
use crate::content::HashWords;
use crate::crypto::PublicKey;
use crate::session::Identity;

/// Book-keeping shared by the in-process ledger implementations
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(super) struct LedgerState {
    /// identity -> registration
    registry: HashMap<Identity, Registration>,
    /// storage address -> storage contents
    storages: HashMap<StorageAddress, Storage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Registration {
    public_key: PublicKey,
    storage: StorageAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Storage {
    owner: Identity,
    entries: Vec<StoredEntry>,
    /// path -> position of the latest entry for that path
    latest: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    path: String,
    words: HashWords,
}

impl LedgerState {
    pub(super) fn register<T>(
        &mut self,
        caller: &Identity,
        public_key: &PublicKey,
    ) -> Result<StorageAddress, LedgerError<T>> {
        if let Some(existing) = self.registry.get(caller) {
            return Err(LedgerError::AlreadyRegistered(*caller, existing.storage));
        }

        let storage = StorageAddress::generate();
        self.storages.insert(
            storage,
            Storage {
                owner: *caller,
                entries: Vec::new(),
                latest: HashMap::new(),
            },
        );
        self.registry.insert(
            *caller,
            Registration {
                public_key: *public_key,
                storage,
            },
        );
        Ok(storage)
    }

    pub(super) fn storage<T>(&self, caller: &Identity) -> Result<StorageAddress, LedgerError<T>> {
        self.registry
            .get(caller)
            .map(|registration| registration.storage)
            .ok_or(LedgerError::NotRegistered(*caller))
    }

    pub(super) fn public_key<T>(&self, identity: &Identity) -> Result<PublicKey, LedgerError<T>> {
        self.registry
            .get(identity)
            .map(|registration| registration.public_key)
            .ok_or(LedgerError::NotRegistered(*identity))
    }

    fn storage_at<T>(&self, address: StorageAddress) -> Result<&Storage, LedgerError<T>> {
        self.storages
            .get(&address)
            .ok_or(LedgerError::UnknownStorage(address))
    }

    pub(super) fn owner<T>(&self, address: StorageAddress) -> Result<Identity, LedgerError<T>> {
        Ok(self.storage_at(address)?.owner)
    }

    pub(super) fn size<T>(&self, address: StorageAddress) -> Result<u64, LedgerError<T>> {
        Ok(self.storage_at(address)?.entries.len() as u64)
    }

    pub(super) fn entry_at<T>(
        &self,
        address: StorageAddress,
        position: u64,
    ) -> Result<(String, HashWords), LedgerError<T>> {
        let storage = self.storage_at(address)?;
        let size = storage.entries.len() as u64;
        usize::try_from(position)
            .ok()
            .and_then(|index| storage.entries.get(index))
            .map(|entry| (entry.path.clone(), entry.words))
            .ok_or(LedgerError::PositionOutOfRange { position, size })
    }

    pub(super) fn get<T>(&self, address: StorageAddress, path: &str) -> Result<HashWords, LedgerError<T>> {
        let storage = self.storage_at(address)?;
        storage
            .latest
            .get(path)
            .and_then(|position| storage.entries.get(*position as usize))
            .map(|entry| entry.words)
            .ok_or_else(|| LedgerError::PathNotFound(path.to_string()))
    }

    pub(super) fn append<T>(
        &mut self,
        caller: &Identity,
        address: StorageAddress,
        path: &str,
        words: HashWords,
    ) -> Result<u64, LedgerError<T>> {
        if !self.registry.contains_key(caller) {
            return Err(LedgerError::NotRegistered(*caller));
        }
        let storage = self
            .storages
            .get_mut(&address)
            .ok_or(LedgerError::UnknownStorage(address))?;

        if storage.owner != *caller && !path.starts_with(&delivery_prefix(caller)) {
            return Err(LedgerError::Unauthorized {
                caller: *caller,
                owner: storage.owner,
                path: path.to_string(),
            });
        }

        let position = storage.entries.len() as u64;
        storage.entries.push(StoredEntry {
            path: path.to_string(),
            words,
        });
        storage.latest.insert(path.to_string(), position);
        Ok(position)
    }
}
