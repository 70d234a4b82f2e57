//! Re-encryption grants
//!
//! A grant is the capability a grantor hands to a proxy so that ciphertext
//! encrypted to the grantor can be transformed into ciphertext the grantee can
//! open. It contains no private key of either party.
//!
//! # Wire Format
//!
//! ```text
//! [ grantor: 32 ][ grantee: 32 ][ re-key: 32 ][ precursor: 32 ][ commitment: 32 ]
//! ```
//!
//! - `re-key` is the scalar `a * d^-1`
//! - `precursor` is the point `x * G` the grantee needs to recompute `d`
//! - `commitment` is `d * G`, which lets anyone check `re-key * commitment == grantor`

use std::convert::TryFrom;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};

use super::keys::{point_from_bytes, KeyError, PublicKey, PUBLIC_KEY_SIZE};

/// Size of a scalar or compressed point in bytes
const ELEMENT_SIZE: usize = 32;
/// Total size of a serialized grant in bytes
pub const GRANT_SIZE: usize = 2 * PUBLIC_KEY_SIZE + 3 * ELEMENT_SIZE;

/// Errors that can occur while parsing a grant
#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("grant error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

/// A capability that re-targets one grantor's ciphertext to one grantee
///
/// Grants are derived deterministically from the grantor's key and the
/// grantee's public key, so the same `(grantor, grantee)` pair always yields the
/// same grant and it can be reused for every file the grantor shares with that
/// grantee.
///
/// # Examples
///
/// ```ignore
/// let grant = pre::generate_grant(&alice_secret, &bob_public)?;
/// let for_bob = pre::reencrypt(&ciphertext, &grant)?;
/// let plaintext = pre::decrypt(&for_bob, &bob_secret)?;
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReEncryptionGrant {
    pub(crate) grantor: PublicKey,
    pub(crate) grantee: PublicKey,
    pub(crate) key: Scalar,
    pub(crate) precursor: EdwardsPoint,
    pub(crate) commitment: EdwardsPoint,
}

impl ReEncryptionGrant {
    /// The public key whose ciphertext this grant can transform
    pub fn grantor(&self) -> &PublicKey {
        &self.grantor
    }

    /// The public key able to open transformed ciphertext
    pub fn grantee(&self) -> &PublicKey {
        &self.grantee
    }

    /// Check that the re-key is consistent with the grantor's public key
    ///
    /// This is the only validation a proxy can perform without key material,
    /// and it catches grants that were corrupted or assembled from mismatched
    /// parts.
    pub fn is_consistent(&self) -> bool {
        match self.grantor.to_edwards() {
            Ok(grantor) => self.key * self.commitment == grantor,
            Err(_) => false,
        }
    }

    pub fn to_bytes(&self) -> [u8; GRANT_SIZE] {
        let mut out = [0u8; GRANT_SIZE];
        let mut offset = 0;
        for part in [
            self.grantor.to_bytes(),
            self.grantee.to_bytes(),
            self.key.to_bytes(),
            self.precursor.compress().to_bytes(),
            self.commitment.compress().to_bytes(),
        ] {
            out[offset..offset + ELEMENT_SIZE].copy_from_slice(&part);
            offset += ELEMENT_SIZE;
        }
        out
    }

    /// Parse a grant from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, GrantError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; GRANT_SIZE];
        hex::decode_to_slice(hex, &mut buff).map_err(|_| anyhow::anyhow!("hex decode error"))?;
        Self::try_from(&buff[..])
    }

    /// Convert grant to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl TryFrom<&[u8]> for ReEncryptionGrant {
    type Error = GrantError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != GRANT_SIZE {
            return Err(anyhow::anyhow!(
                "invalid grant size, expected {}, got {}",
                GRANT_SIZE,
                bytes.len()
            )
            .into());
        }
        let mut chunks = bytes.chunks_exact(ELEMENT_SIZE);
        let mut next = || chunks.next().unwrap_or_default();

        let grantor = PublicKey::try_from(next())?;
        let grantee = PublicKey::try_from(next())?;

        let mut key_bytes = [0u8; ELEMENT_SIZE];
        key_bytes.copy_from_slice(next());
        let key = Option::<Scalar>::from(Scalar::from_canonical_bytes(key_bytes))
            .ok_or_else(|| anyhow::anyhow!("re-key is not a canonical scalar"))?;

        let precursor = point_from_bytes(next())?;
        let commitment = point_from_bytes(next())?;

        Ok(Self {
            grantor,
            grantee,
            key,
            precursor,
            commitment,
        })
    }
}

impl Serialize for ReEncryptionGrant {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for ReEncryptionGrant {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{Error, Visitor};
        use std::fmt;

        struct GrantVisitor;

        impl<'de> Visitor<'de> for GrantVisitor {
            type Value = ReEncryptionGrant;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte array or sequence of GRANT_SIZE")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: Error,
            {
                ReEncryptionGrant::try_from(v).map_err(E::custom)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut bytes = Vec::with_capacity(GRANT_SIZE);
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                ReEncryptionGrant::try_from(bytes.as_slice()).map_err(A::Error::custom)
            }
        }

        // Try bytes first (for binary formats), fallback to seq (for JSON)
        deserializer.deserialize_byte_buf(GrantVisitor)
    }
}
