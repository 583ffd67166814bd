//! Error types for encryption and decryption sessions.
//!
//! Every failure is a [`SessionFault`] wrapped in a [`SessionError`] that
//! records where it happened (suite, message id, frame). Faults map onto a
//! small taxonomy, [`ErrorKind`], which is what callers are expected to branch
//! on. Error values never contain key material or plaintext.

use std::{fmt, time::Duration};

use sealframe_crypto::SuiteId;
use sealframe_proto::ProtocolError;
use thiserror::Error;

use crate::{materials::MaterialsError, session::SessionState};

/// Coarse classification of session failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown suite, version or structurally invalid header
    UnsupportedFormat,
    /// Authentication, commitment, signature or ordering failure, or a
    /// truncated message
    BadCiphertext,
    /// Failure reported by the materials manager, or its timeout
    Collaborator,
    /// A configured bound was exceeded
    Resource,
    /// API misuse: calls in the wrong state, invalid requests or config
    Usage,
}

impl ErrorKind {
    /// Stable numeric code of this kind, as registered in the error table.
    pub fn code(self) -> u16 {
        match self {
            Self::UnsupportedFormat => 0x2000,
            Self::BadCiphertext => 0x2001,
            Self::Collaborator => 0x2002,
            Self::Resource => 0x2003,
            Self::Usage => 0x2004,
        }
    }

    /// True for failures that mean the ciphertext cannot be trusted.
    pub fn is_integrity_failure(self) -> bool {
        matches!(self, Self::BadCiphertext)
    }
}

/// What went wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionFault {
    /// Suite id not in the registry
    #[error("unknown algorithm suite {suite_id:#06x}")]
    UnknownSuite {
        /// Requested or parsed suite id
        suite_id: SuiteId,
    },

    /// Header failed structural validation
    #[error("malformed header: {0}")]
    MalformedHeader(ProtocolError),

    /// Body or trailer failed structural validation
    #[error("malformed body: {0}")]
    MalformedBody(ProtocolError),

    /// Encrypt request names a suite the commitment policy forbids
    #[error("suite {suite_id:#06x} is not allowed for encryption by the commitment policy")]
    SuiteNotAllowed {
        /// Requested suite
        suite_id: SuiteId,
    },

    /// Message uses a non-committing suite but the policy requires commitment
    #[error("suite {suite_id:#06x} lacks key commitment required by policy")]
    CommitmentRequired {
        /// Suite named in the header
        suite_id: SuiteId,
    },

    /// Stored key commitment does not match the derived one
    #[error("key commitment mismatch")]
    CommitmentMismatch,

    /// Header tag did not verify
    #[error("header authentication failed")]
    HeaderAuthenticationFailed,

    /// Frame or single block tag did not verify
    #[error("body authentication failed")]
    BodyAuthenticationFailed,

    /// Frame arrived out of order, duplicated or after a gap
    #[error("unexpected sequence number: expected {expected}, got {actual}")]
    UnexpectedSequenceNumber {
        /// Next sequence number
        expected: u32,
        /// Sequence number on the wire
        actual: u32,
    },

    /// Frame IV differs from the one derived from its sequence number
    #[error("frame iv does not match its sequence number")]
    IvMismatch,

    /// Trailing signature did not verify
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Signed message lacks a usable verification key in its context
    #[error("missing or invalid verification key in encryption context")]
    InvalidVerificationKey,

    /// Input ended before the message was complete
    #[error("message truncated")]
    Truncated,

    /// Bytes remain after the message ended
    #[error("{len} unexpected bytes after end of message")]
    TrailingData {
        /// Number of extra bytes
        len: usize,
    },

    /// Materials manager failure, passed through unchanged
    #[error("materials manager: {0}")]
    Collaborator(MaterialsError),

    /// Materials manager did not answer in time
    #[error("key acquisition timed out after {timeout:?}")]
    KeyAcquisitionTimedOut {
        /// Configured timeout
        timeout: Duration,
    },

    /// Materials manager returned a data key of the wrong length
    #[error("data key length {actual} does not match suite length {expected}")]
    InvalidDataKey {
        /// Suite data key length
        expected: usize,
        /// Length returned
        actual: usize,
    },

    /// Materials manager returned no encrypted data keys
    #[error("materials contain no encrypted data keys")]
    NoEncryptedDataKeys,

    /// Materials manager answered with the wrong kind of response
    #[error("materials response does not match the request")]
    UnexpectedKeyResponse,

    /// Reading or writing the caller's stream failed
    #[error("i/o error: {0}")]
    Io(String),

    /// A configured bound was exceeded
    #[error("{what} limit of {limit} exceeded")]
    LimitExceeded {
        /// Bound that was hit
        what: &'static str,
        /// Configured value
        limit: u64,
    },

    /// More frames than sequence numbers
    #[error("frame sequence numbers exhausted")]
    SequenceExhausted,

    /// Operation not valid in the current state
    #[error("cannot {operation} in state {state:?}")]
    InvalidState {
        /// State when the call was made
        state: SessionState,
        /// Attempted operation
        operation: &'static str,
    },

    /// Caller tried to set a context key reserved by the engine
    #[error("encryption context key {key:?} is reserved")]
    ReservedContextKey {
        /// Offending key
        key: String,
    },

    /// Configuration is inconsistent
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong
        reason: &'static str,
    },
}

impl SessionFault {
    /// Classify this fault.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownSuite { .. } | Self::CommitmentRequired { .. } => {
                ErrorKind::UnsupportedFormat
            },
            Self::MalformedHeader(err) if err.is_resource_limit() => ErrorKind::Resource,
            Self::MalformedHeader(err) if err.is_incomplete() => ErrorKind::BadCiphertext,
            Self::MalformedHeader(_) => ErrorKind::UnsupportedFormat,
            Self::MalformedBody(err) if err.is_resource_limit() => ErrorKind::Resource,
            Self::MalformedBody(_)
            | Self::CommitmentMismatch
            | Self::HeaderAuthenticationFailed
            | Self::BodyAuthenticationFailed
            | Self::UnexpectedSequenceNumber { .. }
            | Self::IvMismatch
            | Self::SignatureInvalid
            | Self::InvalidVerificationKey
            | Self::Truncated
            | Self::TrailingData { .. } => ErrorKind::BadCiphertext,
            Self::Collaborator(_)
            | Self::KeyAcquisitionTimedOut { .. }
            | Self::InvalidDataKey { .. }
            | Self::NoEncryptedDataKeys
            | Self::UnexpectedKeyResponse
            | Self::Io(_) => ErrorKind::Collaborator,
            Self::LimitExceeded { .. } | Self::SequenceExhausted => ErrorKind::Resource,
            Self::SuiteNotAllowed { .. }
            | Self::InvalidState { .. }
            | Self::ReservedContextKey { .. }
            | Self::InvalidConfig { .. } => ErrorKind::Usage,
        }
    }
}

/// Where a failure happened. Never contains secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Suite of the message, once known
    pub suite_id: Option<SuiteId>,
    /// Message id, once known (public, carried in the header)
    pub message_id: Option<Vec<u8>>,
    /// Sequence number of the frame being processed, if any
    pub sequence_number: Option<u32>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(suite_id) = self.suite_id {
            write!(f, "suite={suite_id:#06x}")?;
            sep = " ";
        }
        if let Some(message_id) = &self.message_id {
            write!(f, "{sep}message_id={}", hex::encode(message_id))?;
            sep = " ";
        }
        if let Some(sequence_number) = self.sequence_number {
            write!(f, "{sep}seq={sequence_number}")?;
        }
        Ok(())
    }
}

/// A session failure with its location.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{fault} [{context}]")]
pub struct SessionError {
    /// What went wrong
    pub fault: SessionFault,
    /// Where it went wrong
    pub context: ErrorContext,
}

impl SessionError {
    /// Attach a location to a fault.
    pub fn new(fault: SessionFault, context: ErrorContext) -> Self {
        Self { fault, context }
    }

    /// Taxonomy class of the failure.
    pub fn kind(&self) -> ErrorKind {
        self.fault.kind()
    }

    /// Error table code of the failure.
    pub fn code(&self) -> u16 {
        self.kind().code()
    }

    /// The materials manager error, if that is what failed.
    pub fn collaborator_error(&self) -> Option<&MaterialsError> {
        match &self.fault {
            SessionFault::Collaborator(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionFault> for SessionError {
    fn from(fault: SessionFault) -> Self {
        Self::new(fault, ErrorContext::default())
    }
}

impl From<MaterialsError> for SessionFault {
    fn from(err: MaterialsError) -> Self {
        Self::Collaborator(err)
    }
}

impl From<std::io::Error> for SessionFault {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
