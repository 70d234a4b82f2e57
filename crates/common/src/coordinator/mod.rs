//! End-to-end submit, retrieve and share
//!
//! Every operation takes the acting [`Session`] explicitly. Each one is
//! available as a plain `async fn` and as a `spawn_*` variant returning an
//! [`OperationHandle`] whose status channel reports the current [`Step`]
//! and exactly one terminal outcome.
//!
//! Nothing here is transactional across the ledger and the blob store. A
//! blob stored before a failed index append stays in the blob store with
//! no index entry pointing at it; callers retry the whole operation.

use serde::{Deserialize, Serialize};

use crate::blobs::BlobStore;
use crate::content::ContentIdentifier;
use crate::crypto::{pre, ReEncryptionGrant};
use crate::index::{AccessIndex, IndexEntry, IndexError};
use crate::ledger::{delivery_prefix, LedgerAuthority, StorageAddress, SHARED_ROOT};
use crate::session::{Identity, Session};

mod error;
mod operation;

pub use error::{CoordinatorError, FailureKind};
pub use operation::{OperationHandle, OperationStatus, Progress, Step};

/// Where a shared entry landed in the grantee's index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedEntry {
    pub path: String,
    pub position: u64,
}

#[derive(Debug, Clone)]
pub struct StorageCoordinator<L: LedgerAuthority, B: BlobStore> {
    index: AccessIndex<L>,
    blobs: B,
}

fn validate_path(path: &str, allow_shared: bool) -> Result<(), CoordinatorError> {
    let invalid = |reason: &str| CoordinatorError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if !path.starts_with('/') {
        return Err(invalid("paths must be absolute"));
    }
    if path.len() == 1 {
        return Err(invalid("path names no file"));
    }
    if !allow_shared && (path.starts_with(SHARED_ROOT) || path == SHARED_ROOT.trim_end_matches('/'))
    {
        return Err(invalid("the shared namespace is written only by sharing"));
    }
    Ok(())
}

/// Path under which `grantor`'s `path` is delivered to a grantee
pub fn shared_path(grantor: &Identity, path: &str) -> String {
    format!("{}{}", delivery_prefix(grantor), path.trim_start_matches('/'))
}

impl<L: LedgerAuthority, B: BlobStore> StorageCoordinator<L, B> {
    pub fn new(ledger: L, blobs: B) -> Self {
        Self {
            index: AccessIndex::new(ledger),
            blobs,
        }
    }

    pub fn index(&self) -> &AccessIndex<L> {
        &self.index
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Register the session's identity and public key with the ledger
    pub async fn register(&self, session: &Session) -> Result<StorageAddress, CoordinatorError> {
        Ok(self
            .index
            .register(session.identity(), session.public_key())
            .await?)
    }

    async fn ensure_registered(
        &self,
        session: &Session,
        progress: &Progress,
    ) -> Result<(), CoordinatorError> {
        match self.index.storage(session.identity()).await {
            Ok(_) => Ok(()),
            Err(IndexError::NotRegistered(_)) => {
                progress.step(Step::Registering);
                match self.register(session).await {
                    // lost a race with another registration of the same identity
                    Err(CoordinatorError::Index(IndexError::AlreadyRegistered(_))) | Ok(_) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Encrypt `plaintext` to the session's key, store it and index it at `path`
    ///
    /// Returns the index position the ledger assigned.
    pub async fn submit(
        &self,
        session: &Session,
        path: &str,
        plaintext: &[u8],
    ) -> Result<u64, CoordinatorError> {
        self.submit_with(session, path, plaintext, &Progress::none())
            .await
    }

    pub async fn submit_with(
        &self,
        session: &Session,
        path: &str,
        plaintext: &[u8],
        progress: &Progress,
    ) -> Result<u64, CoordinatorError> {
        validate_path(path, false)?;
        self.ensure_registered(session, progress).await?;

        progress.step(Step::Encrypting);
        let ciphertext = pre::encrypt(plaintext, session.public_key())?;

        progress.step(Step::StoringBlob);
        let content = self.blobs.put(ciphertext).await?;

        progress.step(Step::AppendingIndex);
        let position = self
            .append(session.identity(), session.identity(), path, content)
            .await?;
        tracing::info!(
            "{} submitted {} ({} bytes) at position {}",
            session.identity(),
            path,
            plaintext.len(),
            position
        );
        Ok(position)
    }

    async fn append(
        &self,
        caller: &Identity,
        owner: &Identity,
        path: &str,
        content: ContentIdentifier,
    ) -> Result<u64, CoordinatorError> {
        let entry = IndexEntry::new(path, content);
        self.index
            .append_as(caller, owner, &entry)
            .await
            .map_err(|e| {
                tracing::warn!(
                    "index append of {} for {} failed, blob {} is orphaned: {}",
                    path,
                    owner,
                    content,
                    e
                );
                e.into()
            })
    }

    /// Read and decrypt the latest entry at `path` in the session's index
    pub async fn retrieve(&self, session: &Session, path: &str) -> Result<Vec<u8>, CoordinatorError> {
        self.retrieve_with(session, path, &Progress::none()).await
    }

    pub async fn retrieve_with(
        &self,
        session: &Session,
        path: &str,
        progress: &Progress,
    ) -> Result<Vec<u8>, CoordinatorError> {
        progress.step(Step::ReadingIndex);
        let entry = self.index.lookup(session.identity(), path).await?;
        self.open(session, &entry, progress).await
    }

    /// Read and decrypt the entry at `position` in the session's index
    pub async fn retrieve_at(
        &self,
        session: &Session,
        position: u64,
    ) -> Result<Vec<u8>, CoordinatorError> {
        self.retrieve_at_with(session, position, &Progress::none())
            .await
    }

    pub async fn retrieve_at_with(
        &self,
        session: &Session,
        position: u64,
        progress: &Progress,
    ) -> Result<Vec<u8>, CoordinatorError> {
        progress.step(Step::ReadingIndex);
        let entry = self.index.get(session.identity(), position).await?;
        self.open(session, &entry, progress).await
    }

    async fn open(
        &self,
        session: &Session,
        entry: &IndexEntry,
        progress: &Progress,
    ) -> Result<Vec<u8>, CoordinatorError> {
        progress.step(Step::FetchingBlob);
        let ciphertext = self.blobs.get(&entry.content).await?;

        progress.step(Step::Decrypting);
        let plaintext = pre::decrypt(&ciphertext, session.secret_key())?;
        tracing::debug!(
            "{} retrieved {} ({} bytes)",
            session.identity(),
            entry.path,
            plaintext.len()
        );
        Ok(plaintext)
    }

    /// The grant `session` would issue to `grantee`
    pub async fn grant(
        &self,
        session: &Session,
        grantee: &Identity,
    ) -> Result<ReEncryptionGrant, CoordinatorError> {
        let grantee_key = self.index.public_key(grantee).await?;
        Ok(pre::generate_grant(session.secret_key(), &grantee_key)?)
    }

    /// Give `grantee` read access to the grantor's latest entry at `path`
    ///
    /// The grantor's blob is left as it is. A re-encrypted copy is stored
    /// and delivered into the grantee's index under
    /// `/shared/<grantor>/<path>`.
    pub async fn share(
        &self,
        grantor: &Session,
        grantee: &Identity,
        path: &str,
    ) -> Result<SharedEntry, CoordinatorError> {
        self.share_with(grantor, grantee, path, &Progress::none())
            .await
    }

    pub async fn share_with(
        &self,
        grantor: &Session,
        grantee: &Identity,
        path: &str,
        progress: &Progress,
    ) -> Result<SharedEntry, CoordinatorError> {
        validate_path(path, true)?;

        progress.step(Step::ReadingIndex);
        let entry = self.index.lookup(grantor.identity(), path).await?;

        progress.step(Step::FetchingBlob);
        let ciphertext = self.blobs.get(&entry.content).await?;

        progress.step(Step::ResolvingGrantee);
        let grantee_key = self.index.public_key(grantee).await?;

        progress.step(Step::GeneratingGrant);
        let grant = pre::generate_grant(grantor.secret_key(), &grantee_key)?;

        progress.step(Step::Reencrypting);
        let transformed = pre::reencrypt(&ciphertext, &grant)?;

        progress.step(Step::StoringBlob);
        let content = self.blobs.put(transformed).await?;

        progress.step(Step::AppendingIndex);
        let delivered = shared_path(grantor.identity(), path);
        let position = self
            .append(grantor.identity(), grantee, &delivered, content)
            .await?;
        tracing::info!(
            "{} shared {} with {} as {} at position {}",
            grantor.identity(),
            path,
            grantee,
            delivered,
            position
        );

        Ok(SharedEntry {
            path: delivered,
            position,
        })
    }

    /// Every entry of `identity`'s index in append order
    pub async fn list(&self, identity: &Identity) -> Result<Vec<IndexEntry>, CoordinatorError> {
        Ok(self.index.entries(identity).await?)
    }

    pub fn spawn_submit(
        &self,
        session: Session,
        path: String,
        plaintext: Vec<u8>,
    ) -> OperationHandle<u64> {
        let this = self.clone();
        OperationHandle::spawn(move |progress| async move {
            this.submit_with(&session, &path, &plaintext, &progress)
                .await
        })
    }

    pub fn spawn_retrieve(&self, session: Session, path: String) -> OperationHandle<Vec<u8>> {
        let this = self.clone();
        OperationHandle::spawn(move |progress| async move {
            this.retrieve_with(&session, &path, &progress).await
        })
    }

    pub fn spawn_retrieve_at(&self, session: Session, position: u64) -> OperationHandle<Vec<u8>> {
        let this = self.clone();
        OperationHandle::spawn(move |progress| async move {
            this.retrieve_at_with(&session, position, &progress).await
        })
    }

    pub fn spawn_share(
        &self,
        grantor: Session,
        grantee: Identity,
        path: String,
    ) -> OperationHandle<SharedEntry> {
        let this = self.clone();
        OperationHandle::spawn(move |progress| async move {
            this.share_with(&grantor, &grantee, &path, &progress).await
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blobs::IrohBlobStore;
    use crate::crypto::SecretKey;
    use crate::ledger::MemoryLedger;

    fn session() -> Session {
        Session::from_secret(SecretKey::generate().unwrap())
    }

    fn coordinator() -> StorageCoordinator<MemoryLedger, IrohBlobStore> {
        StorageCoordinator::new(MemoryLedger::new(), IrohBlobStore::memory())
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("/doc", false).is_ok());
        assert!(validate_path("/a/b/c", false).is_ok());
        assert!(validate_path("doc", false).is_err());
        assert!(validate_path("", false).is_err());
        assert!(validate_path("/", false).is_err());
        assert!(validate_path("/shared", false).is_err());
        assert!(validate_path("/shared/0xabc/doc", false).is_err());
        assert!(validate_path("/shared/0xabc/doc", true).is_ok());
        assert!(validate_path("/sharedfolder/doc", false).is_ok());
    }

    #[test]
    fn test_shared_path() {
        let grantor = Identity::from([0xab; 20]);
        assert_eq!(
            shared_path(&grantor, "/docs/a.txt"),
            format!("/shared/{}/docs/a.txt", grantor)
        );
    }

    #[tokio::test]
    async fn test_submit_then_retrieve() {
        let coordinator = coordinator();
        let alice = session();

        let position = coordinator.submit(&alice, "/doc1", b"hello").await.unwrap();
        assert_eq!(position, 0);
        assert_eq!(coordinator.retrieve(&alice, "/doc1").await.unwrap(), b"hello");
        assert_eq!(coordinator.retrieve_at(&alice, 0).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_submit_stores_ciphertext_only() {
        let coordinator = coordinator();
        let alice = session();
        coordinator.submit(&alice, "/doc1", b"hello").await.unwrap();

        let entry = coordinator.index().get(alice.identity(), 0).await.unwrap();
        let stored = coordinator.blobs().get(&entry.content).await.unwrap();
        assert!(!stored.windows(5).any(|w| w == b"hello"));
        assert_ne!(entry.content, ContentIdentifier::for_content(b"hello"));
    }

    #[tokio::test]
    async fn test_submit_rejects_shared_namespace() {
        let coordinator = coordinator();
        let alice = session();
        let err = coordinator
            .submit(&alice, "/shared/0x00/doc", b"x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Malformed);
        assert_eq!(coordinator.index().size(alice.identity()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawned_submit_reports_outcome() {
        let coordinator = coordinator();
        let alice = session();
        let handle = coordinator.spawn_submit(alice.clone(), "/doc".into(), b"data".to_vec());
        assert_eq!(handle.outcome().await.unwrap(), 0);

        let handle = coordinator.spawn_retrieve(alice, "/missing".into());
        let err = handle.outcome().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::IndexMiss);
    }
}
