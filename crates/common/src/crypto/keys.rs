use std::ops::Deref;

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use iroh::{PublicKey as PPublicKey, SecretKey as SSecretKey};
use serde::{Deserialize, Serialize};

/// Size of Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Public half of an identity's long-term key pair
///
/// A thin wrapper around Iroh's `PublicKey` (an Ed25519 point). Besides naming
/// the key in the registry, the point itself is the public element used by
/// proxy re-encryption: ciphertext is encrypted to it and grants are derived
/// towards it.
///
/// # Examples
///
/// ```ignore
/// let secret_key = SecretKey::generate()?;
/// let public_key = secret_key.public();
///
/// let hex = public_key.to_hex();
/// let recovered = PublicKey::from_hex(&hex)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Copy)]
pub struct PublicKey(PPublicKey);

impl Deref for PublicKey {
    type Target = PPublicKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<PPublicKey> for PublicKey {
    fn from(key: PPublicKey) -> Self {
        PublicKey(key)
    }
}

impl From<PublicKey> for PPublicKey {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

impl TryFrom<[u8; PUBLIC_KEY_SIZE]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: [u8; PUBLIC_KEY_SIZE]) -> Result<Self, Self::Error> {
        let key = PPublicKey::from_bytes(&bytes)
            .map_err(|e| anyhow::anyhow!("invalid public key: {}", e))?;
        Ok(PublicKey(key))
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid public key size, expected {}, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )
            .into());
        }
        let mut buff = [0; PUBLIC_KEY_SIZE];
        buff.copy_from_slice(bytes);
        Self::try_from(buff)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl PublicKey {
    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; PUBLIC_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("public key hex decode error"))?;
        Self::try_from(buff)
    }

    /// Convert public key to raw bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        *self.0.as_bytes()
    }

    /// Convert public key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Decompress the key into a point of the prime-order subgroup
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid Edwards point, or if the
    /// point has a small-order component (which would leak bits of any scalar
    /// multiplied against it).
    #[allow(clippy::wrong_self_convention)]
    pub(crate) fn to_edwards(&self) -> Result<EdwardsPoint, KeyError> {
        point_from_bytes(&self.to_bytes())
    }
}

/// Decompress 32 bytes into a torsion-free, non-identity Edwards point
pub(crate) fn point_from_bytes(bytes: &[u8]) -> Result<EdwardsPoint, KeyError> {
    let point = CompressedEdwardsY::from_slice(bytes)
        .map_err(|_| anyhow::anyhow!("invalid edwards point length"))?
        .decompress()
        .ok_or_else(|| anyhow::anyhow!("failed to decompress edwards point"))?;
    if point.is_small_order() || !point.is_torsion_free() {
        return Err(anyhow::anyhow!("edwards point is not in the prime-order subgroup").into());
    }
    Ok(point)
}

/// Secret half of an identity's long-term key pair
///
/// A thin wrapper around Iroh's `SecretKey`. The clamped Ed25519 signing scalar
/// doubles as the private exponent for proxy re-encryption, so one key pair
/// serves both identity and decryption.
///
/// # Security Considerations
///
/// - Never hand this key to a proxy; grants exist so that you don't have to
/// - Store it only through the key-loading collaborator (e.g. a PEM file)
///
/// # Examples
///
/// ```ignore
/// let secret_key = SecretKey::generate()?;
/// let pem = secret_key.to_pem();
/// let recovered = SecretKey::from_pem(&pem)?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretKey(pub SSecretKey);

impl From<[u8; PRIVATE_KEY_SIZE]> for SecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SSecretKey::from_bytes(&secret))
    }
}

impl Deref for SecretKey {
    type Target = SSecretKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl SecretKey {
    /// Parse a secret key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; PRIVATE_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("private key hex decode error"))?;
        Ok(Self::from(buff))
    }

    /// Generate a new random secret key using a cryptographically secure RNG
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
        Ok(Self::from(bytes))
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.public())
    }

    /// Convert secret key to raw bytes
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Convert secret key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Encode secret key in PEM format for secure storage
    ///
    /// Returns a PEM-encoded string with tag "PRIVATE KEY".
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new("PRIVATE KEY", self.to_bytes());
        pem::encode(&pem)
    }

    /// Parse a secret key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PEM string is malformed
    /// - The PEM tag is not "PRIVATE KEY"
    /// - The key size is incorrect
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow::anyhow!("failed to parse PEM: {}", e))?;

        if pem.tag() != "PRIVATE KEY" {
            return Err(anyhow::anyhow!("invalid PEM tag, expected PRIVATE KEY").into());
        }

        let contents = pem.contents();
        if contents.len() != PRIVATE_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid private key size in PEM, expected {}, got {}",
                PRIVATE_KEY_SIZE,
                contents.len()
            )
            .into());
        }

        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        bytes.copy_from_slice(contents);
        Ok(Self::from(bytes))
    }

    /// The private exponent matching [`PublicKey::to_edwards`]
    ///
    /// The clamped scalar bytes of the Ed25519 key, reduced mod the group
    /// order. `scalar * G` equals the Ed25519 public point.
    pub(crate) fn to_scalar(&self) -> Scalar {
        let signing_key = self.0.secret();
        Scalar::from_bytes_mod_order(signing_key.to_scalar_bytes())
    }
}
