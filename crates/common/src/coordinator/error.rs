use crate::blobs::BlobError;
use crate::content::ContentAddressError;
use crate::crypto::{DecryptionError, EncryptionError, InvalidGrantError};
use crate::index::IndexError;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Encryption(#[from] EncryptionError),
    #[error(transparent)]
    Decryption(#[from] DecryptionError),
    #[error(transparent)]
    InvalidGrant(#[from] InvalidGrantError),
    #[error(transparent)]
    Address(#[from] ContentAddressError),
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("operation cancelled")]
    Cancelled,
}

/// Coarse classification of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Nothing at the requested position or path
    IndexMiss,
    /// The identity has not registered with the ledger
    NotRegistered,
    /// No provider produced the blob in time
    NetworkMiss,
    /// The ciphertext is not readable with this key
    DecryptionFailure,
    InvalidGrant,
    RejectedAppend,
    Malformed,
    /// The ledger or blob transport failed
    Transport,
    Cancelled,
}

impl CoordinatorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CoordinatorError::Index(e) => match e {
                IndexError::OutOfRange { .. } => FailureKind::IndexMiss,
                IndexError::NotRegistered(_) => FailureKind::NotRegistered,
                IndexError::AppendRejected { .. } | IndexError::AlreadyRegistered(_) => {
                    FailureKind::RejectedAppend
                }
                IndexError::Authority(_) => FailureKind::Transport,
                IndexError::Address(_) => FailureKind::Malformed,
            },
            CoordinatorError::Blob(BlobError::NotFound(_)) => FailureKind::NetworkMiss,
            CoordinatorError::Blob(BlobError::Network(_)) => FailureKind::Transport,
            CoordinatorError::Decryption(_) => FailureKind::DecryptionFailure,
            CoordinatorError::InvalidGrant(_) => FailureKind::InvalidGrant,
            CoordinatorError::Encryption(_)
            | CoordinatorError::Address(_)
            | CoordinatorError::InvalidPath { .. } => FailureKind::Malformed,
            CoordinatorError::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Whether repeating the same call may succeed
    ///
    /// Only transport-layer failures qualify. Cryptographic and authorization
    /// failures repeat identically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::NetworkMiss | FailureKind::Transport
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::content::ContentIdentifier;
    use crate::index::Lookup;
    use crate::session::Identity;

    #[test]
    fn test_transport_failures_are_retryable() {
        let id = ContentIdentifier::for_content(b"x");
        assert!(CoordinatorError::from(BlobError::NotFound(id)).is_retryable());
        assert!(CoordinatorError::from(BlobError::Network("reset".into())).is_retryable());
        assert!(CoordinatorError::from(IndexError::Authority("down".into())).is_retryable());
    }

    #[test]
    fn test_index_miss_is_distinct_from_network_miss() {
        let miss = CoordinatorError::from(IndexError::OutOfRange {
            identity: Identity::from([1u8; 20]),
            lookup: Lookup::Position(0),
            size: 0,
        });
        assert_eq!(miss.kind(), FailureKind::IndexMiss);
        assert!(!miss.is_retryable());

        let decrypt = CoordinatorError::from(DecryptionError::Corrupted);
        assert_eq!(decrypt.kind(), FailureKind::DecryptionFailure);
        assert!(!decrypt.is_retryable());
    }
}
