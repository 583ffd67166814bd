//! Algorithm suite registry.
//!
//! A suite is a fixed bundle of cryptographic parameters identified by a
//! 16-bit id on the wire. The table is a compile-time constant: lookups are
//! pure, never allocate, and are safe to share across threads without locks.
//!
//! Unknown ids are rejected by [`lookup`] before anything else in a header is
//! interpreted.

use crate::{CryptoError, Result};

/// Wire identifier of an algorithm suite.
pub type SuiteId = u16;

/// Length of the message id in version 1 headers.
const MESSAGE_ID_LEN_V1: usize = 16;

/// Length of the message id in version 2 headers.
const MESSAGE_ID_LEN_V2: usize = 32;

/// Message format version a suite is encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageVersion {
    /// Non-committing format (16-byte message id, explicit header IV)
    V1,
    /// Committing format (32-byte message id, commitment in header)
    V2,
}

impl MessageVersion {
    /// Version byte as written on the wire.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::V1 => 0x01,
            Self::V2 => 0x02,
        }
    }

    /// Parse a version byte. `None` if unsupported.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::V1),
            0x02 => Some(Self::V2),
            _ => None,
        }
    }
}

/// AEAD cipher used for the header tag and body frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgorithm {
    /// AES-128 in Galois/Counter Mode
    Aes128Gcm,
    /// AES-256 in Galois/Counter Mode
    Aes256Gcm,
    /// ChaCha20 stream cipher with Poly1305 authenticator
    ChaCha20Poly1305,
}

/// Hash function driving HKDF. `None` uses the data key directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfHash {
    /// No derivation: content key equals data key
    None,
    /// HKDF-SHA256
    Sha256,
    /// HKDF-SHA384
    Sha384,
    /// HKDF-SHA512
    Sha512,
}

/// Trailing signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// Ed25519ph over a SHA-512 digest of the message
    Ed25519,
}

/// Immutable parameters of an algorithm suite.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct AlgorithmSuite {
    /// Wire identifier
    pub id: SuiteId,
    /// Human-readable name
    pub name: &'static str,
    /// Header format this suite is written with
    pub message_version: MessageVersion,
    /// AEAD cipher
    pub aead: AeadAlgorithm,
    /// Length of the data key the materials manager must supply
    pub data_key_len: usize,
    /// Length of the derived content key
    pub aead_key_len: usize,
    /// AEAD IV length
    pub aead_iv_len: usize,
    /// AEAD authentication tag length
    pub aead_tag_len: usize,
    /// Hash used for content key derivation
    pub kdf: KdfHash,
    /// Trailing signature, if any
    pub signature: Option<SignatureAlgorithm>,
    /// Whether the header carries a key commitment
    pub requires_commitment: bool,
}

impl AlgorithmSuite {
    /// Identifier for AES-128-GCM with the data key used directly.
    pub const AES_128_GCM_IV12_TAG16_NO_KDF: SuiteId = 0x0014;
    /// Identifier for AES-256-GCM with the data key used directly.
    pub const AES_256_GCM_IV12_TAG16_NO_KDF: SuiteId = 0x0078;
    /// Identifier for AES-128-GCM with HKDF-SHA256.
    pub const AES_128_GCM_IV12_TAG16_HKDF_SHA256: SuiteId = 0x0114;
    /// Identifier for AES-256-GCM with HKDF-SHA256.
    pub const AES_256_GCM_IV12_TAG16_HKDF_SHA256: SuiteId = 0x0178;
    /// Identifier for AES-256-GCM with HKDF-SHA384 and an Ed25519 trailer.
    pub const AES_256_GCM_IV12_TAG16_HKDF_SHA384_ED25519: SuiteId = 0x0378;
    /// Identifier for the committing AES-256-GCM suite.
    pub const AES_256_GCM_HKDF_SHA512_COMMIT_KEY: SuiteId = 0x0478;
    /// Identifier for the committing AES-256-GCM suite with an Ed25519 trailer.
    pub const AES_256_GCM_HKDF_SHA512_COMMIT_KEY_ED25519: SuiteId = 0x0578;
    /// Identifier for ChaCha20-Poly1305 with HKDF-SHA256.
    pub const CHACHA20_POLY1305_HKDF_SHA256: SuiteId = 0x0820;

    /// Length of the message id this suite's header format carries.
    pub fn message_id_len(&self) -> usize {
        match self.message_version {
            MessageVersion::V1 => MESSAGE_ID_LEN_V1,
            MessageVersion::V2 => MESSAGE_ID_LEN_V2,
        }
    }

    /// Whether the header carries a key commitment.
    pub fn is_committing(&self) -> bool {
        self.requires_commitment
    }

    /// Whether messages end with a trailing signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// Build a suite row. All registered suites use 12-byte IVs and 16-byte tags.
const fn suite(
    id: SuiteId,
    name: &'static str,
    message_version: MessageVersion,
    aead: AeadAlgorithm,
    key_len: usize,
    kdf: KdfHash,
    signature: Option<SignatureAlgorithm>,
) -> AlgorithmSuite {
    AlgorithmSuite {
        id,
        name,
        message_version,
        aead,
        data_key_len: key_len,
        aead_key_len: key_len,
        aead_iv_len: 12,
        aead_tag_len: 16,
        kdf,
        signature,
        requires_commitment: matches!(message_version, MessageVersion::V2),
    }
}

static SUITES: [AlgorithmSuite; 8] = [
    suite(
        AlgorithmSuite::AES_128_GCM_IV12_TAG16_NO_KDF,
        "AES_128_GCM_IV12_TAG16_NO_KDF",
        MessageVersion::V1,
        AeadAlgorithm::Aes128Gcm,
        16,
        KdfHash::None,
        None,
    ),
    suite(
        AlgorithmSuite::AES_256_GCM_IV12_TAG16_NO_KDF,
        "AES_256_GCM_IV12_TAG16_NO_KDF",
        MessageVersion::V1,
        AeadAlgorithm::Aes256Gcm,
        32,
        KdfHash::None,
        None,
    ),
    suite(
        AlgorithmSuite::AES_128_GCM_IV12_TAG16_HKDF_SHA256,
        "AES_128_GCM_IV12_TAG16_HKDF_SHA256",
        MessageVersion::V1,
        AeadAlgorithm::Aes128Gcm,
        16,
        KdfHash::Sha256,
        None,
    ),
    suite(
        AlgorithmSuite::AES_256_GCM_IV12_TAG16_HKDF_SHA256,
        "AES_256_GCM_IV12_TAG16_HKDF_SHA256",
        MessageVersion::V1,
        AeadAlgorithm::Aes256Gcm,
        32,
        KdfHash::Sha256,
        None,
    ),
    suite(
        AlgorithmSuite::AES_256_GCM_IV12_TAG16_HKDF_SHA384_ED25519,
        "AES_256_GCM_IV12_TAG16_HKDF_SHA384_ED25519",
        MessageVersion::V1,
        AeadAlgorithm::Aes256Gcm,
        32,
        KdfHash::Sha384,
        Some(SignatureAlgorithm::Ed25519),
    ),
    suite(
        AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY,
        "AES_256_GCM_HKDF_SHA512_COMMIT_KEY",
        MessageVersion::V2,
        AeadAlgorithm::Aes256Gcm,
        32,
        KdfHash::Sha512,
        None,
    ),
    suite(
        AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY_ED25519,
        "AES_256_GCM_HKDF_SHA512_COMMIT_KEY_ED25519",
        MessageVersion::V2,
        AeadAlgorithm::Aes256Gcm,
        32,
        KdfHash::Sha512,
        Some(SignatureAlgorithm::Ed25519),
    ),
    suite(
        AlgorithmSuite::CHACHA20_POLY1305_HKDF_SHA256,
        "CHACHA20_POLY1305_HKDF_SHA256",
        MessageVersion::V1,
        AeadAlgorithm::ChaCha20Poly1305,
        32,
        KdfHash::Sha256,
        None,
    ),
];

/// Look up a suite by wire identifier.
///
/// # Errors
///
/// - `UnknownSuite` if the id is not registered
pub fn lookup(id: SuiteId) -> Result<&'static AlgorithmSuite> {
    SUITES.iter().find(|suite| suite.id == id).ok_or(CryptoError::UnknownSuite { id })
}

/// Every registered suite, in registry order.
pub fn all_suites() -> &'static [AlgorithmSuite] {
    &SUITES
}
