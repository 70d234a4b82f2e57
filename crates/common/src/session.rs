//! Identities and the per-call session context
//!
//! The coordinator never reads an "active account" from ambient state. Every
//! call receives a [`Session`] naming who is acting and carrying their keys;
//! switching identity means building a new session, never mutating one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::{PublicKey, SecretKey};

/// Size of an identity address in bytes
pub const IDENTITY_SIZE: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid identity: {0}")]
    Invalid(String),
}

/// Address-like identifier of a principal
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity([u8; IDENTITY_SIZE]);

impl Identity {
    /// Derive the address for a public key: the first 20 bytes of its BLAKE3 hash
    pub fn from_public_key(key: &PublicKey) -> Self {
        let hash = blake3::hash(&key.to_bytes());
        let mut bytes = [0u8; IDENTITY_SIZE];
        bytes.copy_from_slice(&hash.as_bytes()[..IDENTITY_SIZE]);
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; IDENTITY_SIZE] {
        self.0
    }
}

impl From<[u8; IDENTITY_SIZE]> for Identity {
    fn from(bytes: [u8; IDENTITY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

impl FromStr for Identity {
    type Err = IdentityError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; IDENTITY_SIZE];
        hex::decode_to_slice(hex, &mut bytes)
            .map_err(|e| IdentityError::Invalid(format!("{}: {}", s, e)))?;
        Ok(Self(bytes))
    }
}

// Serialized as the display string so identities can key JSON maps
impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A long-term key pair bound to one identity
#[derive(Debug, Clone)]
pub struct KeyPair {
    public: PublicKey,
    secret: SecretKey,
}

impl KeyPair {
    pub fn generate() -> Result<Self, crate::crypto::KeyError> {
        Ok(Self::from(SecretKey::generate()?))
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl From<SecretKey> for KeyPair {
    fn from(secret: SecretKey) -> Self {
        Self {
            public: secret.public(),
            secret,
        }
    }
}

/// Explicit context for one acting identity
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
    keys: KeyPair,
}

impl Session {
    /// A session for an identity assigned by an external authentication step
    pub fn new(identity: Identity, keys: KeyPair) -> Self {
        Self { identity, keys }
    }

    /// A session whose identity is derived from its public key
    pub fn from_secret(secret: SecretKey) -> Self {
        let keys = KeyPair::from(secret);
        Self {
            identity: Identity::from_public_key(keys.public()),
            keys,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keys.public()
    }

    pub fn secret_key(&self) -> &SecretKey {
        self.keys.secret()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_identity_display_roundtrip() {
        let key = SecretKey::generate().unwrap().public();
        let identity = Identity::from_public_key(&key);
        let text = identity.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 2 + 2 * IDENTITY_SIZE);
        assert_eq!(text.parse::<Identity>().unwrap(), identity);
    }

    #[test]
    fn test_identity_is_stable_per_key() {
        let key = SecretKey::generate().unwrap().public();
        assert_eq!(Identity::from_public_key(&key), Identity::from_public_key(&key));
    }

    #[test]
    fn test_identity_rejects_bad_hex() {
        assert!("0x1234".parse::<Identity>().is_err());
        assert!("not hex".parse::<Identity>().is_err());
    }

    #[test]
    fn test_session_from_secret() {
        let secret = SecretKey::generate().unwrap();
        let public = secret.public();
        let session = Session::from_secret(secret);
        assert_eq!(session.public_key(), &public);
        assert_eq!(session.identity(), &Identity::from_public_key(&public));
    }
}
