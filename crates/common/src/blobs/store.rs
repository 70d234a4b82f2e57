use std::future::{Future, IntoFuture};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use iroh_blobs::{
    api::blobs::{BlobStatus, Blobs},
    store::{fs::FsStore, mem::MemStore},
    BlobsProtocol,
};

use super::{BlobError, BlobStore};
use crate::content::ContentIdentifier;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Blob store backed by iroh-blobs
///
/// Retrieval is bounded by `fetch_timeout`. A blob that is absent, or not
/// produced within the timeout, is reported as `NotFound` so the caller
/// can decide whether to retry.
#[derive(Clone, Debug)]
pub struct IrohBlobStore {
    inner: Arc<BlobsProtocol>,
    fetch_timeout: Duration,
}

impl IrohBlobStore {
    /// Load a filesystem-backed store rooted at `path`
    pub async fn fs(path: &Path) -> Result<Self, BlobError> {
        tracing::debug!("IrohBlobStore::fs loading store at {:?}", path);
        let store = FsStore::load(path)
            .await
            .map_err(|e| BlobError::Network(e.to_string()))?;
        Ok(Self::from_protocol(BlobsProtocol::new(&store, None)))
    }

    /// An in-memory store
    pub fn memory() -> Self {
        let store = MemStore::new();
        Self::from_protocol(BlobsProtocol::new(&store, None))
    }

    fn from_protocol(blobs: BlobsProtocol) -> Self {
        Self {
            inner: Arc::new(blobs),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    fn blobs(&self) -> &Blobs {
        self.inner.store().blobs()
    }
}

/// Run a whole fetch, status check included, under one deadline
async fn bounded<F>(timeout: Duration, id: &ContentIdentifier, fetch: F) -> Result<Bytes, BlobError>
where
    F: Future<Output = Result<Bytes, BlobError>>,
{
    match tokio::time::timeout(timeout, fetch).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("timed out after {:?} fetching {}", timeout, id);
            Err(BlobError::NotFound(*id))
        }
    }
}

#[async_trait]
impl BlobStore for IrohBlobStore {
    async fn put(&self, data: Vec<u8>) -> Result<ContentIdentifier, BlobError> {
        let len = data.len();
        let hash = self
            .blobs()
            .add_bytes(data)
            .into_future()
            .await
            .map_err(|e| BlobError::Network(e.to_string()))?
            .hash;
        let id = ContentIdentifier::from_hash(hash);
        tracing::debug!("stored {} bytes as {}", len, id);
        Ok(id)
    }

    async fn get(&self, id: &ContentIdentifier) -> Result<Bytes, BlobError> {
        let fetch = async {
            if !self.has(id).await? {
                tracing::debug!("blob {} not present", id);
                return Err(BlobError::NotFound(*id));
            }
            self.blobs().get_bytes(id.hash()).await.map_err(|e| {
                tracing::warn!("failed to read blob {}: {}", id, e);
                BlobError::Network(e.to_string())
            })
        };

        bounded(self.fetch_timeout, id, fetch).await
    }

    async fn has(&self, id: &ContentIdentifier) -> Result<bool, BlobError> {
        let status = self
            .blobs()
            .status(id.hash())
            .await
            .map_err(|e| BlobError::Network(e.to_string()))?;
        Ok(matches!(status, BlobStatus::Complete { .. }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_is_content_addressed() {
        let store = IrohBlobStore::memory();
        let data = b"same bytes".to_vec();

        let first = store.put(data.clone()).await.unwrap();
        let second = store.put(data.clone()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, ContentIdentifier::for_content(&data));

        let other = store.put(b"other bytes".to_vec()).await.unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_get_roundtrip() {
        let store = IrohBlobStore::memory();
        let id = store.put(b"hello".to_vec()).await.unwrap();
        assert!(store.has(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let store = IrohBlobStore::memory().with_fetch_timeout(Duration::from_millis(200));
        let id = ContentIdentifier::for_content(b"never stored");
        assert!(!store.has(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap_err(), BlobError::NotFound(id));
    }

    #[tokio::test]
    async fn test_stalled_fetch_is_not_found() {
        let id = ContentIdentifier::for_content(b"slow");
        let stalled = async {
            std::future::pending::<()>().await;
            Ok(Bytes::new())
        };
        assert_eq!(
            bounded(Duration::from_millis(50), &id, stalled).await.unwrap_err(),
            BlobError::NotFound(id)
        );
    }

    #[tokio::test]
    async fn test_fs_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = IrohBlobStore::fs(&dir.path().join("blobs")).await.unwrap();
        let id = store.put(b"on disk".to_vec()).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().as_ref(), b"on disk");
    }
}
