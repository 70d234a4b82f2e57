use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

use crate::content::ContentIdentifier;

mod store;

pub use store::{IrohBlobStore, DEFAULT_FETCH_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    /// No provider produced the blob within the retrieval timeout
    #[error("blob {0} not found")]
    NotFound(ContentIdentifier),
    #[error("blob store network error: {0}")]
    Network(String),
}

/// Client of a content-addressed byte store
///
/// Identifiers depend only on the payload, so putting the same bytes twice
/// yields the same identifier and stores nothing new.
#[async_trait]
pub trait BlobStore: Send + Sync + Debug + Clone + 'static {
    async fn put(&self, data: Vec<u8>) -> Result<ContentIdentifier, BlobError>;

    async fn get(&self, id: &ContentIdentifier) -> Result<Bytes, BlobError>;

    async fn has(&self, id: &ContentIdentifier) -> Result<bool, BlobError>;
}
