//! Sealframe Cryptographic Primitives
//!
//! Cryptographic building blocks for the Sealframe message format. Pure
//! functions with deterministic outputs. Callers provide random bytes (message
//! ids, signing seeds) so every operation can be reproduced in tests.
//!
//! # Key Lifecycle
//!
//! A data key is produced (or unwrapped) by an external materials manager and
//! handed to key derivation together with the message id. Derivation yields a
//! content key scoped to exactly that message, plus a commitment value for
//! committing suites. The content key authenticates the header and encrypts
//! every frame of the body.
//!
//! ```text
//! Materials Manager
//!        │
//!        ▼
//! Data Key ──┬── HKDF(message_id) → Content Key → AEAD (header tag, frames)
//!            │
//!            └── HKDF(message_id) → Commitment  → stored in header (v2)
//! ```
//!
//! Data keys and content keys are zeroized when dropped. Neither type
//! implements a `Debug` that prints key bytes.
//!
//! # Security
//!
//! Key Separation:
//! - Every message draws a fresh message id, so content keys are never reused
//!   across messages even when a data key is
//! - Committing suites derive key and commitment with distinct info labels
//!
//! Authenticity:
//! - AES-GCM or ChaCha20-Poly1305 tags over every frame and the header
//! - Frame IVs are the big-endian sequence number, never random
//! - Optional Ed25519ph trailing signature over the whole message

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod derivation;
pub mod error;
pub mod keys;
pub mod signature;
pub mod suite;

pub use aead::{open_detached, seal_detached};
pub use derivation::{DerivedKeys, derive_content_key, verify_commitment};
pub use error::CryptoError;
pub use keys::{COMMITMENT_LEN, Commitment, ContentKey, DataKey};
pub use signature::{
    SIGNATURE_LEN, SIGNING_SEED_LEN, TrailerSigner, TrailerVerifier, VERIFYING_KEY_LEN,
};
pub use suite::{
    AeadAlgorithm, AlgorithmSuite, KdfHash, MessageVersion, SignatureAlgorithm, SuiteId,
    all_suites, lookup,
};

/// Result alias for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
