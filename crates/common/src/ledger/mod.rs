//! The ledger authority
//!
//! The durable owner of record for every identity's access index. It is
//! modelled on a registry contract plus one storage contract per identity:
//!
//! - `register` binds an identity to its public key material and creates its
//!   storage; the registering identity becomes the storage's owner
//! - each storage is an append-only list of `(path, HashWords)` entries whose
//!   positions are assigned at commit time
//!
//! The authority authenticates the caller itself; implementations receive the
//! caller's identity as already-verified input.
//!
//! # Authorization
//!
//! The owner of a storage may append any path. Any other registered identity
//! may only append under its own delivery prefix, `/shared/<caller>/`, which is
//! how a grantor places a shared entry into a grantee's index.

mod file;
mod memory;
mod provider;
mod state;

pub use file::{FileLedger, FileLedgerError};
pub use memory::{MemoryLedger, MemoryLedgerError};
pub use provider::{LedgerAuthority, LedgerError, StorageAddress};

use crate::session::Identity;

/// Root of every delivery namespace
pub const SHARED_ROOT: &str = "/shared/";

/// The path prefix under which `identity` may append into storages it does not own
pub fn delivery_prefix(identity: &Identity) -> String {
    format!("{}{}/", SHARED_ROOT, identity)
}
