use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs4::fs_std::FileExt;

use super::provider::{LedgerAuthority, LedgerError, StorageAddress};
use super::state::LedgerState;
use crate::content::HashWords;
use crate::crypto::PublicKey;
use crate::session::Identity;

#[derive(Debug, thiserror::Error)]
pub enum FileLedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ledger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

type Outcome<R> = Result<R, LedgerError<FileLedgerError>>;

/// Ledger authority persisted as a single JSON document
///
/// Every call reads the document from disk, so handles opened by different
/// processes agree on one commit order. Writes hold an exclusive lock on a
/// sidecar `<file>.lock` across read, apply and atomic rename; a failed write
/// leaves the document untouched.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileLedger {
    /// Open the ledger at `path`, starting empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FileLedgerError> {
        let path = path.as_ref().to_path_buf();
        load(&path)?;

        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        tracing::debug!("opened file ledger at {}", path.display());
        Ok(Self { path, lock_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<R>(
        &self,
        f: impl FnOnce(&LedgerState) -> Outcome<R> + Send + 'static,
    ) -> Outcome<R>
    where
        R: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let state = load(&path)?;
            f(&state)
        })
        .await
        .map_err(FileLedgerError::from)?
    }

    async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut LedgerState) -> Outcome<R> + Send + 'static,
    ) -> Outcome<R>
    where
        R: Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();
        tokio::task::spawn_blocking(move || {
            // released when the handle drops
            let _lock = lock_exclusive(&lock_path)?;
            let mut state = load(&path)?;
            let result = f(&mut state)?;
            persist(&path, &state)?;
            Ok(result)
        })
        .await
        .map_err(FileLedgerError::from)?
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn load(path: &Path) -> Result<LedgerState, FileLedgerError> {
    match std::fs::read(path) {
        Ok(data) => Ok(serde_json::from_slice(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerState::default()),
        Err(e) => Err(e.into()),
    }
}

fn lock_exclusive(lock_path: &Path) -> Result<File, FileLedgerError> {
    std::fs::create_dir_all(parent_dir(lock_path))?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)?;
    file.lock_exclusive()?;
    Ok(file)
}

fn persist(path: &Path, state: &LedgerState) -> Result<(), FileLedgerError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, state)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl LedgerAuthority for FileLedger {
    type Error = FileLedgerError;

    async fn register(
        &self,
        caller: &Identity,
        public_key: &PublicKey,
    ) -> Result<StorageAddress, LedgerError<Self::Error>> {
        let (caller, public_key) = (*caller, *public_key);
        self.mutate(move |state| state.register(&caller, &public_key)).await
    }

    async fn storage(&self, caller: &Identity) -> Result<StorageAddress, LedgerError<Self::Error>> {
        let caller = *caller;
        self.read(move |state| state.storage(&caller)).await
    }

    async fn public_key(&self, identity: &Identity) -> Result<PublicKey, LedgerError<Self::Error>> {
        let identity = *identity;
        self.read(move |state| state.public_key(&identity)).await
    }

    async fn owner(&self, storage: StorageAddress) -> Result<Identity, LedgerError<Self::Error>> {
        self.read(move |state| state.owner(storage)).await
    }

    async fn size(&self, storage: StorageAddress) -> Result<u64, LedgerError<Self::Error>> {
        self.read(move |state| state.size(storage)).await
    }

    async fn entry_at(
        &self,
        storage: StorageAddress,
        position: u64,
    ) -> Result<(String, HashWords), LedgerError<Self::Error>> {
        self.read(move |state| state.entry_at(storage, position)).await
    }

    async fn get(
        &self,
        storage: StorageAddress,
        path: &str,
    ) -> Result<HashWords, LedgerError<Self::Error>> {
        let path = path.to_string();
        self.read(move |state| state.get(storage, &path)).await
    }

    async fn append(
        &self,
        caller: &Identity,
        storage: StorageAddress,
        path: &str,
        words: HashWords,
    ) -> Result<u64, LedgerError<Self::Error>> {
        let (caller, path) = (*caller, path.to_string());
        self.mutate(move |state| state.append(&caller, storage, &path, words)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{decode, ContentIdentifier};
    use crate::crypto::SecretKey;
    use tempfile::TempDir;

    fn identity() -> (Identity, PublicKey) {
        let key = SecretKey::generate().unwrap().public();
        (Identity::from_public_key(&key), key)
    }

    fn words(data: &[u8]) -> HashWords {
        decode(&ContentIdentifier::for_content(data)).unwrap()
    }

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::open(dir.path().join("ledger.json")).unwrap();
        let (alice, _) = identity();
        assert!(matches!(
            ledger.storage(&alice).await,
            Err(LedgerError::NotRegistered(_))
        ));
        assert!(!ledger.path().exists());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let (alice, key) = identity();

        let storage = {
            let ledger = FileLedger::open(&path).unwrap();
            let storage = ledger.register(&alice, &key).await.unwrap();
            ledger.append(&alice, storage, "/a", words(b"a")).await.unwrap();
            ledger.append(&alice, storage, "/b", words(b"b")).await.unwrap();
            storage
        };

        let reopened = FileLedger::open(&path).unwrap();
        assert_eq!(reopened.storage(&alice).await.unwrap(), storage);
        assert_eq!(reopened.public_key(&alice).await.unwrap(), key);
        assert_eq!(reopened.size(storage).await.unwrap(), 2);
        assert_eq!(reopened.get(storage, "/b").await.unwrap(), words(b"b"));
        assert_eq!(reopened.entry_at(storage, 0).await.unwrap().0, "/a");
    }

    #[tokio::test]
    async fn test_rejected_append_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let (alice, alice_key) = identity();
        let (bob, bob_key) = identity();

        let ledger = FileLedger::open(&path).unwrap();
        ledger.register(&alice, &alice_key).await.unwrap();
        let bob_storage = ledger.register(&bob, &bob_key).await.unwrap();
        let before = std::fs::read(&path).unwrap();

        assert!(ledger
            .append(&alice, bob_storage, "/doc", words(b"x")).await
            .is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(ledger.size(bob_storage).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            FileLedger::open(&path),
            Err(FileLedgerError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_handle_keeps_committed_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let (alice, key) = identity();

        let first = FileLedger::open(&path).unwrap();
        let storage = first.register(&alice, &key).await.unwrap();
        let second = FileLedger::open(&path).unwrap();

        assert_eq!(first.append(&alice, storage, "/a", words(b"a")).await.unwrap(), 0);
        assert_eq!(second.append(&alice, storage, "/b", words(b"b")).await.unwrap(), 1);
        assert_eq!(first.size(storage).await.unwrap(), 2);

        let reopened = FileLedger::open(&path).unwrap();
        assert_eq!(reopened.size(storage).await.unwrap(), 2);
        assert_eq!(reopened.get(storage, "/a").await.unwrap(), words(b"a"));
        assert_eq!(reopened.get(storage, "/b").await.unwrap(), words(b"b"));
    }

    #[tokio::test]
    async fn test_registrations_from_separate_handles_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let (alice, alice_key) = identity();
        let (bob, bob_key) = identity();

        let first = FileLedger::open(&path).unwrap();
        let second = FileLedger::open(&path).unwrap();
        first.register(&alice, &alice_key).await.unwrap();
        second.register(&bob, &bob_key).await.unwrap();

        let reopened = FileLedger::open(&path).unwrap();
        assert_eq!(reopened.public_key(&alice).await.unwrap(), alice_key);
        assert_eq!(reopened.public_key(&bob).await.unwrap(), bob_key);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_get_distinct_positions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let (alice, key) = identity();
        let storage = FileLedger::open(&path)
            .unwrap()
            .register(&alice, &key)
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let ledger = FileLedger::open(&path).unwrap();
            tasks.push(tokio::spawn(async move {
                ledger
                    .append(&alice, storage, &format!("/{}", i), words(&[i]))
                    .await
                    .unwrap()
            }));
        }

        let mut positions = Vec::new();
        for task in tasks {
            positions.push(task.await.unwrap());
        }
        positions.sort();
        assert_eq!(positions, (0..8).collect::<Vec<u64>>());

        let reopened = FileLedger::open(&path).unwrap();
        assert_eq!(reopened.size(storage).await.unwrap(), 8);
        for i in 0..8u8 {
            assert_eq!(
                reopened.get(storage, &format!("/{}", i)).await.unwrap(),
                words(&[i])
            );
        }
    }
}
