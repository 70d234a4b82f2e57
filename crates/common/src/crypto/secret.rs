//! Content encryption using ChaCha20-Poly1305
//!
//! The data-encapsulation half of proxy re-encryption. A `Secret` is never
//! stored or transmitted: it is re-derived from the key-encapsulation shared
//! point by whoever is able to compute that point (the owner, or a grantee
//! holding a re-encrypted capsule).

use std::ops::Deref;

use chacha20poly1305::Key;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of ChaCha20-Poly1305 key in bytes (256 bits)
pub const SECRET_SIZE: usize = 32;
/// Size of the Poly1305 authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Errors that can occur during encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret error: {0}")]
    Default(#[from] anyhow::Error),
    /// The tag did not verify: wrong key, wrong associated data, or tampering
    #[error("authentication failed")]
    Authentication,
}

/// A 256-bit symmetric key for sealing one payload
///
/// The sealed format is `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
/// Associated data is authenticated but not included in the output; the
/// opener must supply the same bytes.
#[derive(Debug, PartialEq, Clone)]
pub struct Secret([u8; SECRET_SIZE]);

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Derive a secret from key material under a domain-separation context
    pub fn derive(context: &str, material: &[u8]) -> Self {
        Self(blake3::derive_key(context, material))
    }

    /// Get a reference to the secret key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Seal data with a fresh random nonce, authenticating `aad` alongside it
    ///
    /// # Errors
    ///
    /// Returns an error if the system RNG fails or the AEAD rejects the input.
    pub fn seal(&self, data: &[u8], aad: &[u8]) -> Result<Vec<u8>, SecretError> {
        let key = Key::from_slice(self.bytes());
        let cipher = ChaCha20Poly1305::new(key);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, Payload { msg: data, aad })
            .map_err(|_| anyhow::anyhow!("encrypt error"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_ref());
        out.extend_from_slice(ciphertext.as_ref());

        Ok(out)
    }

    /// Open data produced by [`Secret::seal`]
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Data is too short to contain a nonce and tag
    /// - Authentication tag verification fails ([`SecretError::Authentication`])
    pub fn open(&self, data: &[u8], aad: &[u8]) -> Result<Vec<u8>, SecretError> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(anyhow::anyhow!("data too short for nonce and tag").into());
        }

        let key = Key::from_slice(self.bytes());
        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        let cipher = ChaCha20Poly1305::new(key);
        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &data[NONCE_SIZE..],
                    aad,
                },
            )
            .map_err(|_| SecretError::Authentication)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seal_open() {
        let secret = Secret::derive("vault test", b"material");
        let data = b"hello world, this is a test message for encryption";

        let sealed = secret.seal(data, b"aad").unwrap();
        let opened = secret.open(&sealed, b"aad").unwrap();

        assert_eq!(data.as_slice(), opened.as_slice());
    }

    #[test]
    fn test_wrong_aad_fails_authentication() {
        let secret = Secret::derive("vault test", b"material");
        let sealed = secret.seal(b"payload", b"one").unwrap();
        assert!(matches!(
            secret.open(&sealed, b"two"),
            Err(SecretError::Authentication)
        ));
    }

    #[test]
    fn test_derive_is_domain_separated() {
        let a = Secret::derive("vault test a", b"material");
        let b = Secret::derive("vault test b", b"material");
        assert_ne!(a, b);
        assert_eq!(a, Secret::derive("vault test a", b"material"));
    }

    #[test]
    fn test_tampering_detected() {
        let secret = Secret::derive("vault test", b"material");
        let mut sealed = secret.seal(b"test data for integrity check", b"").unwrap();
        sealed[NONCE_SIZE + 3] ^= 0xFF;
        assert!(matches!(
            secret.open(&sealed, b""),
            Err(SecretError::Authentication)
        ));
    }

    #[test]
    fn test_short_input_rejected() {
        let secret = Secret::derive("vault test", b"material");
        assert!(matches!(
            secret.open(&[0u8; NONCE_SIZE], b""),
            Err(SecretError::Default(_))
        ));
    }

    #[test]
    fn test_empty_payload() {
        let secret = Secret::derive("vault test", b"material");
        let sealed = secret.seal(b"", b"").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + TAG_SIZE);
        assert!(secret.open(&sealed, b"").unwrap().is_empty());
    }
}
