//! Session configuration.

use std::time::Duration;

use sealframe_crypto::{AlgorithmSuite, SuiteId};
use sealframe_proto::{DecodeLimits, MAX_NON_FRAMED_LEN};

use crate::error::SessionFault;

/// Default plaintext bytes per frame.
pub const DEFAULT_FRAME_LENGTH: u32 = 4096;

/// Default upper bound on frame length accepted from headers.
pub const DEFAULT_MAX_FRAME_LENGTH: u32 = 16 * 1024 * 1024;

/// Default upper bound on a non-framed body, in either direction.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 64 * 1024 * 1024;

/// Default time allowed for one materials manager call.
pub const DEFAULT_KEY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on buffered input while a header is incomplete.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 1024 * 1024;

/// Default read size of the streaming drivers.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Which suites may be used to encrypt and decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommitmentPolicy {
    /// Encrypt only with non-committing suites; decrypt anything
    ForbidEncryptAllowDecrypt,
    /// Encrypt only with committing suites; decrypt anything
    RequireEncryptAllowDecrypt,
    /// Encrypt and decrypt only with committing suites
    #[default]
    RequireEncryptRequireDecrypt,
}

impl CommitmentPolicy {
    /// Whether `suite` may be used to encrypt under this policy.
    pub fn allows_encrypt(self, suite: &AlgorithmSuite) -> bool {
        match self {
            Self::ForbidEncryptAllowDecrypt => !suite.is_committing(),
            Self::RequireEncryptAllowDecrypt | Self::RequireEncryptRequireDecrypt => {
                suite.is_committing()
            },
        }
    }

    /// Whether a message written with `suite` may be decrypted under this
    /// policy.
    pub fn allows_decrypt(self, suite: &AlgorithmSuite) -> bool {
        match self {
            Self::ForbidEncryptAllowDecrypt | Self::RequireEncryptAllowDecrypt => true,
            Self::RequireEncryptRequireDecrypt => suite.is_committing(),
        }
    }

    /// Suite used when an encrypt request does not name one.
    pub fn default_suite(self) -> SuiteId {
        match self {
            Self::ForbidEncryptAllowDecrypt => {
                AlgorithmSuite::AES_256_GCM_IV12_TAG16_HKDF_SHA384_ED25519
            },
            Self::RequireEncryptAllowDecrypt | Self::RequireEncryptRequireDecrypt => {
                AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY_ED25519
            },
        }
    }
}

/// Session configuration.
///
/// Plain data with defaults; sessions validate it once on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Plaintext bytes per regular frame; zero writes a non-framed body
    pub frame_length: u32,
    /// Which suites may encrypt and decrypt
    pub commitment_policy: CommitmentPolicy,
    /// Maximum encrypted data keys per message, `None` for unbounded
    pub max_encrypted_data_keys: Option<usize>,
    /// Largest frame length accepted from a header
    pub max_frame_length: u32,
    /// Largest non-framed body accepted or produced
    pub max_body_size: u64,
    /// Largest header accepted when decrypting
    pub max_header_size: usize,
    /// Time allowed for one materials manager call
    pub key_timeout: Duration,
    /// Read size of the streaming drivers
    pub read_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_length: DEFAULT_FRAME_LENGTH,
            commitment_policy: CommitmentPolicy::default(),
            max_encrypted_data_keys: None,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            key_timeout: DEFAULT_KEY_TIMEOUT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl SessionConfig {
    /// Reject inconsistent settings.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` naming the first offending field
    pub fn validate(&self) -> Result<(), SessionFault> {
        let invalid = |reason| Err(SessionFault::InvalidConfig { reason });

        if self.frame_length > self.max_frame_length {
            return invalid("frame_length exceeds max_frame_length");
        }
        if self.max_frame_length == 0 {
            return invalid("max_frame_length must be positive");
        }
        if self.max_body_size > MAX_NON_FRAMED_LEN {
            return invalid("max_body_size exceeds the non-framed format limit");
        }
        if self.max_header_size == 0 {
            return invalid("max_header_size must be positive");
        }
        if self.max_encrypted_data_keys == Some(0) {
            return invalid("max_encrypted_data_keys must be positive");
        }
        if self.key_timeout.is_zero() {
            return invalid("key_timeout must be positive");
        }
        if self.read_chunk_size == 0 {
            return invalid("read_chunk_size must be positive");
        }

        Ok(())
    }

    /// Header decoding bounds derived from this configuration.
    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_encrypted_data_keys: self.max_encrypted_data_keys,
            max_frame_length: self.max_frame_length,
        }
    }
}
