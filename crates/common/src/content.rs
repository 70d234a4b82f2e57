//! Content addressing
//!
//! Translates between the two shapes a content reference takes:
//!
//! - [`ContentIdentifier`]: the CID string the blob store addresses by. Always a
//!   CIDv1 with the `raw` codec over a BLAKE3 multihash, so it maps one-to-one
//!   onto an iroh-blobs [`Hash`].
//! - [`HashWords`]: the fixed-width form the ledger stores, two 32-byte words
//!   holding the binary CID followed by zero padding.
//!
//! [`encode`] and [`decode`] are exact inverses over conformant values.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use cid::Cid;
use iroh_blobs::Hash;
use multihash::Multihash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Multicodec for raw binary
pub const LD_RAW_CODEC: u64 = 0x55;
/// Multihash code for BLAKE3-256
pub const BLAKE3_HASH_CODE: u64 = 0x1e;
/// Size of a BLAKE3 digest
pub const BLAKE3_HASH_SIZE: usize = 32;
/// Size of one ledger word
pub const WORD_SIZE: usize = 32;
/// Number of words the ledger stores per reference
pub const WORD_COUNT: usize = 2;
/// Total width of the ledger representation
pub const HASH_WORDS_SIZE: usize = WORD_SIZE * WORD_COUNT;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentAddressError {
    /// Ledger bytes that do not hold a conformant reference
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// An identifier that [`encode`] could not have produced
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),
}

/// The fixed-width ledger representation of a content reference
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashWords([[u8; WORD_SIZE]; WORD_COUNT]);

impl HashWords {
    pub fn words(&self) -> &[[u8; WORD_SIZE]; WORD_COUNT] {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; HASH_WORDS_SIZE] {
        let mut out = [0u8; HASH_WORDS_SIZE];
        for (chunk, word) in out.chunks_exact_mut(WORD_SIZE).zip(self.0.iter()) {
            chunk.copy_from_slice(word);
        }
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(hex: &str) -> Result<Self, ContentAddressError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)
            .map_err(|e| ContentAddressError::MalformedInput(format!("hex decode error: {}", e)))?;
        Self::try_from(bytes.as_slice())
    }
}

impl From<[[u8; WORD_SIZE]; WORD_COUNT]> for HashWords {
    fn from(words: [[u8; WORD_SIZE]; WORD_COUNT]) -> Self {
        HashWords(words)
    }
}

impl TryFrom<&[u8]> for HashWords {
    type Error = ContentAddressError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != HASH_WORDS_SIZE {
            return Err(ContentAddressError::MalformedInput(format!(
                "expected {} bytes, got {}",
                HASH_WORDS_SIZE,
                bytes.len()
            )));
        }
        let mut words = [[0u8; WORD_SIZE]; WORD_COUNT];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
            word.copy_from_slice(chunk);
        }
        Ok(HashWords(words))
    }
}

impl fmt::Debug for HashWords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashWords(0x{})", self.to_hex())
    }
}

impl Serialize for HashWords {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HashWords {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        HashWords::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Canonical identifier of a blob in the content-addressed store
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentIdentifier(Cid);

impl ContentIdentifier {
    /// Identifier for a blob store hash
    pub fn from_hash(hash: Hash) -> Self {
        // a 32-byte digest always fits a 64-byte multihash
        let mh = Multihash::<64>::wrap(BLAKE3_HASH_CODE, hash.as_bytes())
            .unwrap_or_default();
        Self(Cid::new_v1(LD_RAW_CODEC, mh))
    }

    /// Identifier the blob store will assign to `data`
    pub fn for_content(data: &[u8]) -> Self {
        Self::from_hash(Hash::new(data))
    }

    /// The blob store hash this identifier names
    pub fn hash(&self) -> Hash {
        let mut bytes = [0u8; BLAKE3_HASH_SIZE];
        bytes.copy_from_slice(self.0.hash().digest());
        Hash::from_bytes(bytes)
    }

    pub fn cid(&self) -> &Cid {
        &self.0
    }
}

fn validate(cid: &Cid) -> Result<(), String> {
    if cid.version() != cid::Version::V1 {
        return Err("expected a CIDv1".to_string());
    }
    if cid.codec() != LD_RAW_CODEC {
        return Err(format!("unsupported codec {:#x}", cid.codec()));
    }
    if cid.hash().code() != BLAKE3_HASH_CODE {
        return Err(format!("unsupported multihash {:#x}", cid.hash().code()));
    }
    if cid.hash().digest().len() != BLAKE3_HASH_SIZE {
        return Err(format!(
            "expected a {}-byte digest, got {}",
            BLAKE3_HASH_SIZE,
            cid.hash().digest().len()
        ));
    }
    Ok(())
}

impl TryFrom<Cid> for ContentIdentifier {
    type Error = ContentAddressError;
    fn try_from(cid: Cid) -> Result<Self, Self::Error> {
        validate(&cid).map_err(ContentAddressError::MalformedIdentifier)?;
        Ok(Self(cid))
    }
}

impl From<Hash> for ContentIdentifier {
    fn from(hash: Hash) -> Self {
        Self::from_hash(hash)
    }
}

impl FromStr for ContentIdentifier {
    type Err = ContentAddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cid = Cid::try_from(s)
            .map_err(|e| ContentAddressError::MalformedIdentifier(e.to_string()))?;
        Self::try_from(cid)
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentIdentifier({})", self.0)
    }
}

impl Serialize for ContentIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Turn the ledger's fixed-width bytes into a content identifier
pub fn encode(bytes: &[u8]) -> Result<ContentIdentifier, ContentAddressError> {
    let words = HashWords::try_from(bytes)?;
    encode_words(&words)
}

/// Like [`encode`], for bytes already known to be the right width
pub fn encode_words(words: &HashWords) -> Result<ContentIdentifier, ContentAddressError> {
    let bytes = words.to_bytes();
    let mut cursor = Cursor::new(&bytes[..]);
    let cid = Cid::read_bytes(&mut cursor)
        .map_err(|e| ContentAddressError::MalformedInput(format!("invalid cid: {}", e)))?;

    let consumed = cursor.position() as usize;
    if bytes[consumed..].iter().any(|b| *b != 0) {
        return Err(ContentAddressError::MalformedInput(
            "non-zero bytes after cid".to_string(),
        ));
    }
    validate(&cid).map_err(ContentAddressError::MalformedInput)?;
    Ok(ContentIdentifier(cid))
}

/// Turn a content identifier into the ledger's fixed-width bytes
pub fn decode(id: &ContentIdentifier) -> Result<HashWords, ContentAddressError> {
    validate(&id.0).map_err(ContentAddressError::MalformedIdentifier)?;
    let raw = id.0.to_bytes();
    if raw.len() > HASH_WORDS_SIZE {
        return Err(ContentAddressError::MalformedIdentifier(format!(
            "cid is {} bytes, ledger holds {}",
            raw.len(),
            HASH_WORDS_SIZE
        )));
    }
    let mut bytes = [0u8; HASH_WORDS_SIZE];
    bytes[..raw.len()].copy_from_slice(&raw);
    HashWords::try_from(&bytes[..]).map_err(|e| ContentAddressError::MalformedIdentifier(e.to_string()))
}
