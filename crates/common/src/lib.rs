/**
 * Content blob store client.
 *  A light wrapper around iroh-blobs with a
 *  bounded retrieval timeout.
 */
pub mod blobs;
/**
 * Conversion between the ledger's fixed-width
 *  words and content identifiers.
 */
pub mod content;
/**
 * Submit, retrieve and share, end to end,
 *  with observable operation status.
 */
pub mod coordinator;
/**
 * Cryptographic types and operations.
 *  - Public and Private key implementations
 *  - Proxy re-encryption and re-encryption grants
 */
pub mod crypto;
/**
 * Per-identity append-only index over
 *  a ledger authority.
 */
pub mod index;
/**
 * The ledger authority: registry of identities
 *  and their ordered storage.
 */
pub mod ledger;
pub mod session;

pub mod prelude {
    pub use crate::blobs::{BlobError, BlobStore, IrohBlobStore};
    pub use crate::content::{ContentAddressError, ContentIdentifier, HashWords};
    pub use crate::coordinator::{
        CoordinatorError, FailureKind, OperationHandle, OperationStatus, SharedEntry, Step,
        StorageCoordinator,
    };
    pub use crate::crypto::{PublicKey, ReEncryptionGrant, SecretKey};
    pub use crate::index::{AccessIndex, IndexEntry, IndexError};
    pub use crate::ledger::{FileLedger, LedgerAuthority, MemoryLedger, StorageAddress};
    pub use crate::session::{Identity, KeyPair, Session};
}
