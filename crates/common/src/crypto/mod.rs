//! Cryptographic primitives for vault
//!
//! - **Identity keys**: Ed25519 key pairs (`SecretKey`/`PublicKey`). The same
//!   points and scalars double as the asymmetric keys of proxy re-encryption.
//! - **Payload encryption**: ChaCha20-Poly1305 under a per-ciphertext `Secret`
//!   derived from a key-encapsulation shared point.
//! - **Proxy re-encryption**: [`pre`] encrypts to a public key, derives
//!   [`ReEncryptionGrant`]s, and lets an untrusted proxy re-target ciphertext
//!   from a grantor to a grantee without learning either private key.
//!
//! # Security Model
//!
//! A grant only ever moves ciphertext one hop, from its original owner to one
//! grantee. Delegated ciphertext cannot be re-encrypted again, and nothing in
//! the scheme lets a grantee turn delegated ciphertext back into the owner's
//! form.

mod grant;
mod keys;
pub mod pre;
mod secret;

pub use grant::{GrantError, ReEncryptionGrant, GRANT_SIZE};
pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use pre::{CiphertextForm, DecryptionError, EncryptionError, InvalidGrantError};
pub use secret::{Secret, SecretError};
