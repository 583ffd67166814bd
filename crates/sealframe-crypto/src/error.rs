//! Error types for cryptographic operations

use thiserror::Error;

/// Errors from suite lookup, key derivation and primitive operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Suite identifier is not in the registry
    #[error("unknown algorithm suite: {id:#06x}")]
    UnknownSuite {
        /// The identifier that was looked up
        id: u16,
    },

    /// Message id length does not match the suite's message format
    #[error("invalid message id length: expected {expected}, got {actual}")]
    InvalidMessageIdLength {
        /// Length required by the suite
        expected: usize,
        /// Length supplied
        actual: usize,
    },

    /// Key material has the wrong length for the suite
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// IV has the wrong length for the suite
    #[error("invalid iv length: expected {expected}, got {actual}")]
    InvalidIvLength {
        /// Expected IV length
        expected: usize,
        /// Actual IV length
        actual: usize,
    },

    /// Authentication tag did not verify (tamper or wrong key)
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Derived commitment does not match the commitment in the header
    #[error("key commitment mismatch")]
    CommitmentMismatch,

    /// Trailing signature did not verify
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Verification key bytes are not a valid public key
    #[error("invalid verification key")]
    InvalidVerificationKey,

    /// Suite does not define a trailing signature
    #[error("suite {id:#06x} is not a signing suite")]
    NotSigningSuite {
        /// Suite identifier
        id: u16,
    },
}

impl CryptoError {
    /// Returns true if this error means the input failed an integrity check.
    ///
    /// Integrity failures indicate tampering, corruption or a wrong key.
    /// Everything else is a structural or usage problem detected before any
    /// secret-dependent computation.
    pub fn is_integrity_failure(&self) -> bool {
        match self {
            Self::AuthenticationFailed
            | Self::CommitmentMismatch
            | Self::SignatureInvalid
            | Self::InvalidVerificationKey => true,

            Self::UnknownSuite { .. }
            | Self::InvalidMessageIdLength { .. }
            | Self::InvalidKeyLength { .. }
            | Self::InvalidIvLength { .. }
            | Self::NotSigningSuite { .. } => false,
        }
    }
}
