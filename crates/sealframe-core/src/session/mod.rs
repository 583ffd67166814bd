//! Encryption and decryption sessions.
//!
//! A session owns everything one message needs: the content key, the frame
//! counter, byte counts and the running signature digest. Sessions use the
//! action pattern: methods take input and return [`SessionAction`]s for the
//! driver to execute. They never perform I/O and never block, which keeps
//! them deterministic and lets the driver decide how the materials manager is
//! reached.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────────┐ start / header  ┌───────────────┐  key  ┌──────────────────┐
//! │ Initialized │────────────────>│ HeaderPending │──────>│ FramesInProgress │
//! └─────────────┘                 └───────────────┘       └──────────────────┘
//!                                                                  │ final frame
//!                                                                  ↓
//!                        ┌──────────┐     trailer / none      ┌────────────┐
//!                        │ Complete │<────────────────────────│ Finalizing │
//!                        └──────────┘                         └────────────┘
//!
//!  any non-terminal state ──error / abort──> Aborted
//! ```
//!
//! `Complete` and `Aborted` are terminal. Key material is dropped (and
//! zeroized) on entering either.

mod decrypt;
mod encrypt;

use bytes::Bytes;
pub use decrypt::Decryptor;
pub use encrypt::{EncryptRequest, Encryptor};
use sealframe_crypto::{AlgorithmSuite, CryptoError};
use sealframe_proto::EncryptionContext;

use crate::{
    error::{ErrorContext, SessionError, SessionFault},
    materials::KeyRequest,
};

/// Encryption context key carrying the hex-encoded trailer verification key.
///
/// Set by the engine for signed suites. Callers may not supply it.
pub const RESERVED_PUBLIC_KEY: &str = "sealframe-public-key";

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, nothing processed yet
    Initialized,
    /// Waiting for the data key
    HeaderPending,
    /// Header done, body frames flowing
    FramesInProgress,
    /// Body done, trailer outstanding
    Finalizing,
    /// Message fully produced or verified
    Complete,
    /// Failed or cancelled
    Aborted,
}

impl SessionState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Aborted)
    }
}

/// Actions returned by sessions for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Ask the materials manager, then call `provide_materials` /
    /// `provide_data_key` with the answer
    RequestDataKey(KeyRequest),
    /// Deliver these bytes (ciphertext when encrypting, verified plaintext
    /// when decrypting)
    Output(Bytes),
    /// The message is complete
    Complete,
}

/// Encryption context with engine-reserved keys removed.
pub fn strip_reserved(context: &EncryptionContext) -> EncryptionContext {
    context
        .iter()
        .filter(|(k, _)| !is_reserved_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn is_reserved_key(key: &str) -> bool {
    key == RESERVED_PUBLIC_KEY
}

/// Location fields shared by both session kinds.
#[derive(Debug, Clone, Default)]
struct Location {
    suite: Option<&'static AlgorithmSuite>,
    message_id: Option<Vec<u8>>,
    sequence_number: Option<u32>,
}

impl Location {
    fn context(&self) -> ErrorContext {
        ErrorContext {
            suite_id: self.suite.map(|s| s.id),
            message_id: self.message_id.clone(),
            sequence_number: self.sequence_number,
        }
    }

    fn error(&self, fault: SessionFault) -> SessionError {
        SessionError::new(fault, self.context())
    }

    fn message_id_hex(&self) -> String {
        self.message_id.as_deref().map(hex::encode).unwrap_or_default()
    }
}

/// Map a primitive failure onto a session fault.
///
/// Only called where the inputs were validated by the session, so the
/// remaining variants indicate tampering.
fn crypto_fault(err: CryptoError) -> SessionFault {
    match err {
        CryptoError::UnknownSuite { id } => SessionFault::UnknownSuite { suite_id: id },
        CryptoError::InvalidKeyLength { expected, actual } => {
            SessionFault::InvalidDataKey { expected, actual }
        },
        CryptoError::CommitmentMismatch => SessionFault::CommitmentMismatch,
        CryptoError::SignatureInvalid => SessionFault::SignatureInvalid,
        CryptoError::InvalidVerificationKey => SessionFault::InvalidVerificationKey,
        CryptoError::AuthenticationFailed
        | CryptoError::InvalidMessageIdLength { .. }
        | CryptoError::InvalidIvLength { .. }
        | CryptoError::NotSigningSuite { .. } => SessionFault::BodyAuthenticationFailed,
    }
}
