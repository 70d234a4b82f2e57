//! Proxy re-encryption over Edwards25519
//!
//! A single-hop, unidirectional scheme in the KEM/DEM style:
//!
//! ```text
//! Plaintext --encrypt(A)--> OwnerCiphertext --reencrypt(grant)--> GranteeCiphertext
//!     ^                          |                                     |
//!     +--------decrypt(a)--------+                                     |
//!     +------------------------------------decrypt(b)------------------+
//! ```
//!
//! # Encryption
//!
//! For an owner with public point `A = a*G`: pick random `r`, publish the
//! capsule `E = r*G`, and seal the payload under `K = KDF(r*A, A)`.
//! The owner recovers `r*A` as `a*E`.
//!
//! # Grants
//!
//! For a grantee `B = b*G` the grantor derives `x = H(a, B)`, `X = x*G`,
//! `d = H(X, B, x*B)` and hands out `rk = a * d^-1` together with `X` and
//! `D = d*G`. Neither private key nor `d` appears in the grant.
//!
//! # Re-encryption
//!
//! The proxy replaces `E` with `E' = rk*E` and attaches `X` and `B`. The sealed
//! payload is never touched. The grantee computes `d = H(X, B, b*X)` and
//! recovers `r*A = d*E'`.
//!
//! # Envelope
//!
//! ```text
//! owner:     "PRE1" | 0x01 | A | E              | nonce | sealed
//! delegated: "PRE1" | 0x02 | A | E' | X | B     | nonce | sealed
//! ```
//!
//! The sealed payload authenticates `"PRE1" | A`, so re-encryption does not
//! invalidate it.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

use super::grant::ReEncryptionGrant;
use super::keys::{point_from_bytes, KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};
use super::secret::{Secret, SecretError};

const MAGIC: &[u8; 4] = b"PRE1";
const FORM_OWNER: u8 = 0x01;
const FORM_DELEGATED: u8 = 0x02;
const POINT_SIZE: usize = 32;
const OWNER_HEADER_SIZE: usize = MAGIC.len() + 1 + PUBLIC_KEY_SIZE + POINT_SIZE;
const DELEGATED_HEADER_SIZE: usize = OWNER_HEADER_SIZE + POINT_SIZE + PUBLIC_KEY_SIZE;

const DEM_CONTEXT: &str = "vault pre 2024-05 payload key";
const EPHEMERAL_CONTEXT: &str = "vault pre 2024-05 grant ephemeral";
const DELEGATION_CONTEXT: &str = "vault pre 2024-05 grant delegation";

/// Failure to encrypt or to derive a grant
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("invalid public key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("encryption failed: {0}")]
    Seal(#[from] SecretError),
    #[error("encryption failed: {0}")]
    Default(#[from] anyhow::Error),
}

/// Failure to decrypt
///
/// `NotRecipient` is the "this file is not shared with you" case and is
/// reported before any cryptographic work is done. `Corrupted` means the key
/// was the right one but authentication failed.
#[derive(Debug, thiserror::Error)]
pub enum DecryptionError {
    #[error("ciphertext is addressed to {addressed_to}, not to {key}")]
    NotRecipient {
        addressed_to: PublicKey,
        key: PublicKey,
    },
    #[error("ciphertext failed authentication")]
    Corrupted,
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
}

/// A grant that cannot be applied to the given ciphertext
#[derive(Debug, thiserror::Error)]
pub enum InvalidGrantError {
    #[error("grant is for grantor {grant}, ciphertext was encrypted to {ciphertext}")]
    GrantorMismatch {
        grant: PublicKey,
        ciphertext: PublicKey,
    },
    #[error("ciphertext has already been re-encrypted")]
    AlreadyDelegated,
    #[error("grant re-key does not match its grantor")]
    Inconsistent,
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),
}

/// Which stage of the transformation lineage a ciphertext is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiphertextForm {
    /// Encrypted directly to the owner
    Owner,
    /// Re-encrypted to a grantee
    Delegated,
}

#[derive(Debug)]
enum Capsule {
    Owner {
        capsule: EdwardsPoint,
    },
    Delegated {
        capsule: EdwardsPoint,
        precursor: EdwardsPoint,
        grantee: PublicKey,
    },
}

#[derive(Debug)]
struct Envelope<'a> {
    owner: PublicKey,
    capsule: Capsule,
    sealed: &'a [u8],
}

impl<'a> Envelope<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, String> {
        if data.len() < OWNER_HEADER_SIZE {
            return Err(format!(
                "expected at least {} bytes, got {}",
                OWNER_HEADER_SIZE,
                data.len()
            ));
        }
        if &data[..MAGIC.len()] != MAGIC {
            return Err("unknown envelope magic".to_string());
        }
        let form = data[MAGIC.len()];
        let mut offset = MAGIC.len() + 1;
        let mut take = |len: usize| {
            let slice = &data[offset..offset + len];
            offset += len;
            slice
        };

        let owner = PublicKey::try_from(take(PUBLIC_KEY_SIZE)).map_err(|e| e.to_string())?;
        let capsule = point_from_bytes(take(POINT_SIZE)).map_err(|e| e.to_string())?;

        let capsule = match form {
            FORM_OWNER => Capsule::Owner { capsule },
            FORM_DELEGATED => {
                if data.len() < DELEGATED_HEADER_SIZE {
                    return Err(format!(
                        "expected at least {} bytes, got {}",
                        DELEGATED_HEADER_SIZE,
                        data.len()
                    ));
                }
                let precursor = point_from_bytes(take(POINT_SIZE)).map_err(|e| e.to_string())?;
                let grantee =
                    PublicKey::try_from(take(PUBLIC_KEY_SIZE)).map_err(|e| e.to_string())?;
                Capsule::Delegated {
                    capsule,
                    precursor,
                    grantee,
                }
            }
            other => return Err(format!("unknown ciphertext form {:#04x}", other)),
        };

        Ok(Self {
            owner,
            capsule,
            sealed: &data[offset..],
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DELEGATED_HEADER_SIZE + self.sealed.len());
        out.extend_from_slice(MAGIC);
        match &self.capsule {
            Capsule::Owner { capsule } => {
                out.push(FORM_OWNER);
                out.extend_from_slice(&self.owner.to_bytes());
                out.extend_from_slice(capsule.compress().as_bytes());
            }
            Capsule::Delegated {
                capsule,
                precursor,
                grantee,
            } => {
                out.push(FORM_DELEGATED);
                out.extend_from_slice(&self.owner.to_bytes());
                out.extend_from_slice(capsule.compress().as_bytes());
                out.extend_from_slice(precursor.compress().as_bytes());
                out.extend_from_slice(&grantee.to_bytes());
            }
        }
        out.extend_from_slice(self.sealed);
        out
    }
}

fn associated_data(owner: &PublicKey) -> Vec<u8> {
    let mut aad = Vec::with_capacity(MAGIC.len() + PUBLIC_KEY_SIZE);
    aad.extend_from_slice(MAGIC);
    aad.extend_from_slice(&owner.to_bytes());
    aad
}

fn payload_secret(shared: &EdwardsPoint, owner: &PublicKey) -> Secret {
    let mut material = [0u8; POINT_SIZE + PUBLIC_KEY_SIZE];
    material[..POINT_SIZE].copy_from_slice(shared.compress().as_bytes());
    material[POINT_SIZE..].copy_from_slice(&owner.to_bytes());
    Secret::derive(DEM_CONTEXT, &material)
}

fn hash_to_scalar(context: &str, parts: &[&[u8]]) -> Scalar {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    let mut wide = [0u8; 64];
    hasher.finalize_xof().fill(&mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn random_scalar() -> Result<Scalar, EncryptionError> {
    let mut wide = [0u8; 64];
    getrandom::getrandom(&mut wide)
        .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
    Ok(Scalar::from_bytes_mod_order_wide(&wide))
}

fn delegation_scalar(precursor: &EdwardsPoint, grantee: &PublicKey, shared: &EdwardsPoint) -> Scalar {
    hash_to_scalar(
        DELEGATION_CONTEXT,
        &[
            precursor.compress().as_bytes(),
            &grantee.to_bytes(),
            shared.compress().as_bytes(),
        ],
    )
}

/// Encrypt `plaintext` so that only the holder of `public_key`'s secret (or a
/// grantee of theirs) can read it
pub fn encrypt(plaintext: &[u8], public_key: &PublicKey) -> Result<Vec<u8>, EncryptionError> {
    let owner_point = public_key.to_edwards()?;
    let r = random_scalar()?;
    let capsule = EdwardsPoint::mul_base(&r);
    let shared = r * owner_point;

    let sealed = payload_secret(&shared, public_key).seal(plaintext, &associated_data(public_key))?;
    let envelope = Envelope {
        owner: *public_key,
        capsule: Capsule::Owner { capsule },
        sealed: &sealed,
    };
    Ok(envelope.to_bytes())
}

/// Decrypt owner-form ciphertext with the owner's key, or delegated-form
/// ciphertext with the grantee's key
pub fn decrypt(ciphertext: &[u8], secret_key: &SecretKey) -> Result<Vec<u8>, DecryptionError> {
    let envelope = Envelope::parse(ciphertext).map_err(DecryptionError::Malformed)?;
    let key = secret_key.public();

    let shared = match &envelope.capsule {
        Capsule::Owner { capsule } => {
            if envelope.owner != key {
                return Err(DecryptionError::NotRecipient {
                    addressed_to: envelope.owner,
                    key,
                });
            }
            secret_key.to_scalar() * capsule
        }
        Capsule::Delegated {
            capsule,
            precursor,
            grantee,
        } => {
            if *grantee != key {
                return Err(DecryptionError::NotRecipient {
                    addressed_to: *grantee,
                    key,
                });
            }
            let d = delegation_scalar(precursor, grantee, &(secret_key.to_scalar() * precursor));
            d * capsule
        }
    };

    payload_secret(&shared, &envelope.owner)
        .open(envelope.sealed, &associated_data(&envelope.owner))
        .map_err(|e| match e {
            SecretError::Authentication => DecryptionError::Corrupted,
            SecretError::Default(e) => DecryptionError::Malformed(e.to_string()),
        })
}

/// Derive the grant that lets a proxy re-target `grantor`'s ciphertext to
/// `grantee`
///
/// Deterministic: the same inputs always produce the same grant.
pub fn generate_grant(
    grantor: &SecretKey,
    grantee: &PublicKey,
) -> Result<ReEncryptionGrant, EncryptionError> {
    let grantee_point = grantee.to_edwards()?;
    let a = grantor.to_scalar();

    let x = hash_to_scalar(EPHEMERAL_CONTEXT, &[a.as_bytes(), &grantee.to_bytes()]);
    let precursor = EdwardsPoint::mul_base(&x);
    let d = delegation_scalar(&precursor, grantee, &(x * grantee_point));
    if d == Scalar::ZERO {
        return Err(anyhow::anyhow!("degenerate delegation scalar").into());
    }

    Ok(ReEncryptionGrant {
        grantor: grantor.public(),
        grantee: *grantee,
        key: a * d.invert(),
        precursor,
        commitment: EdwardsPoint::mul_base(&d),
    })
}

/// Transform owner-form ciphertext into grantee-form ciphertext
///
/// Needs no private key; safe to run on an untrusted proxy.
pub fn reencrypt(
    ciphertext: &[u8],
    grant: &ReEncryptionGrant,
) -> Result<Vec<u8>, InvalidGrantError> {
    if !grant.is_consistent() {
        return Err(InvalidGrantError::Inconsistent);
    }
    let envelope =
        Envelope::parse(ciphertext).map_err(InvalidGrantError::MalformedCiphertext)?;

    let capsule = match envelope.capsule {
        Capsule::Owner { capsule } => capsule,
        Capsule::Delegated { .. } => return Err(InvalidGrantError::AlreadyDelegated),
    };
    if envelope.owner != grant.grantor {
        return Err(InvalidGrantError::GrantorMismatch {
            grant: grant.grantor,
            ciphertext: envelope.owner,
        });
    }

    let delegated = Envelope {
        owner: envelope.owner,
        capsule: Capsule::Delegated {
            capsule: grant.key * capsule,
            precursor: grant.precursor,
            grantee: grant.grantee,
        },
        sealed: envelope.sealed,
    };
    Ok(delegated.to_bytes())
}

/// Report which form a ciphertext is in without decrypting it
pub fn form(ciphertext: &[u8]) -> Result<CiphertextForm, DecryptionError> {
    let envelope = Envelope::parse(ciphertext).map_err(DecryptionError::Malformed)?;
    Ok(match envelope.capsule {
        Capsule::Owner { .. } => CiphertextForm::Owner,
        Capsule::Delegated { .. } => CiphertextForm::Delegated,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn key() -> SecretKey {
        SecretKey::generate().unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let owner = key();
        for plaintext in [&b""[..], b"hello", &[0xAB; 4096][..]] {
            let ciphertext = encrypt(plaintext, &owner.public()).unwrap();
            assert_eq!(decrypt(&ciphertext, &owner).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_ciphertexts_are_randomized() {
        let owner = key();
        let one = encrypt(b"same", &owner.public()).unwrap();
        let two = encrypt(b"same", &owner.public()).unwrap();
        assert_ne!(one, two);
    }

    #[test]
    fn test_reencrypt_decrypt() {
        let alice = key();
        let bob = key();
        let plaintext = b"patient record 42";

        let ciphertext = encrypt(plaintext, &alice.public()).unwrap();
        let grant = generate_grant(&alice, &bob.public()).unwrap();
        let for_bob = reencrypt(&ciphertext, &grant).unwrap();

        assert_eq!(form(&for_bob).unwrap(), CiphertextForm::Delegated);
        assert_eq!(decrypt(&for_bob, &bob).unwrap(), plaintext);
    }

    #[test]
    fn test_grantee_cannot_read_owner_ciphertext() {
        let alice = key();
        let bob = key();
        let ciphertext = encrypt(b"hello", &alice.public()).unwrap();

        let result = decrypt(&ciphertext, &bob);
        assert!(matches!(
            result,
            Err(DecryptionError::NotRecipient { addressed_to, .. }) if addressed_to == alice.public()
        ));
    }

    #[test]
    fn test_owner_cannot_read_delegated_ciphertext_as_grantee() {
        let alice = key();
        let bob = key();
        let carol = key();
        let ciphertext = encrypt(b"hello", &alice.public()).unwrap();
        let for_bob = reencrypt(&ciphertext, &generate_grant(&alice, &bob.public()).unwrap()).unwrap();

        assert!(matches!(
            decrypt(&for_bob, &carol),
            Err(DecryptionError::NotRecipient { .. })
        ));
        assert!(matches!(
            decrypt(&for_bob, &alice),
            Err(DecryptionError::NotRecipient { .. })
        ));
    }

    #[test]
    fn test_grant_is_deterministic() {
        let alice = key();
        let bob = key();
        let one = generate_grant(&alice, &bob.public()).unwrap();
        let two = generate_grant(&alice, &bob.public()).unwrap();
        assert_eq!(one, two);
        assert_eq!(one.grantor(), &alice.public());
        assert_eq!(one.grantee(), &bob.public());
    }

    #[test]
    fn test_grant_reused_across_files() {
        let alice = key();
        let bob = key();
        let grant = generate_grant(&alice, &bob.public()).unwrap();
        for plaintext in [&b"first"[..], b"second", b"third"] {
            let ciphertext = encrypt(plaintext, &alice.public()).unwrap();
            let for_bob = reencrypt(&ciphertext, &grant).unwrap();
            assert_eq!(decrypt(&for_bob, &bob).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_wrong_grantor_rejected() {
        let alice = key();
        let bob = key();
        let carol = key();
        let ciphertext = encrypt(b"hello", &alice.public()).unwrap();
        let grant = generate_grant(&carol, &bob.public()).unwrap();

        assert!(matches!(
            reencrypt(&ciphertext, &grant),
            Err(InvalidGrantError::GrantorMismatch { .. })
        ));
    }

    #[test]
    fn test_single_hop_only() {
        let alice = key();
        let bob = key();
        let carol = key();
        let ciphertext = encrypt(b"hello", &alice.public()).unwrap();
        let for_bob = reencrypt(&ciphertext, &generate_grant(&alice, &bob.public()).unwrap()).unwrap();

        let onward = generate_grant(&bob, &carol.public()).unwrap();
        assert!(matches!(
            reencrypt(&for_bob, &onward),
            Err(InvalidGrantError::AlreadyDelegated)
        ));
    }

    #[test]
    fn test_inconsistent_grant_rejected() {
        let alice = key();
        let bob = key();
        let ciphertext = encrypt(b"hello", &alice.public()).unwrap();
        let mut grant = generate_grant(&alice, &bob.public()).unwrap();
        grant.key += Scalar::ONE;

        assert!(matches!(
            reencrypt(&ciphertext, &grant),
            Err(InvalidGrantError::Inconsistent)
        ));
    }

    #[test]
    fn test_corruption_is_distinguished_from_wrong_key() {
        let alice = key();
        let mut ciphertext = encrypt(b"hello world", &alice.public()).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;

        assert!(matches!(
            decrypt(&ciphertext, &alice),
            Err(DecryptionError::Corrupted)
        ));
    }

    #[test]
    fn test_tampered_capsule_fails_authentication() {
        let alice = key();
        let ciphertext = encrypt(b"hello world", &alice.public()).unwrap();
        let other = encrypt(b"hello world", &alice.public()).unwrap();

        // splice the capsule of one ciphertext onto the body of another
        let mut spliced = other[..OWNER_HEADER_SIZE].to_vec();
        spliced.extend_from_slice(&ciphertext[OWNER_HEADER_SIZE..]);
        assert!(matches!(
            decrypt(&spliced, &alice),
            Err(DecryptionError::Corrupted)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let alice = key();
        assert!(matches!(
            decrypt(b"not a ciphertext", &alice),
            Err(DecryptionError::Malformed(_))
        ));
        assert!(matches!(
            reencrypt(b"not a ciphertext", &generate_grant(&alice, &key().public()).unwrap()),
            Err(InvalidGrantError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_truncated_body_is_malformed() {
        let alice = key();
        let ciphertext = encrypt(b"hello", &alice.public()).unwrap();
        assert!(matches!(
            decrypt(&ciphertext[..OWNER_HEADER_SIZE + 4], &alice),
            Err(DecryptionError::Malformed(_))
        ));
    }
}
