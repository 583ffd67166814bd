//! Contract with the cryptographic materials manager.
//!
//! The manager owns everything about master keys: which providers wrap the
//! data key, how unwrapping is authorized, and how providers are reached. The
//! engine only asks for a fresh data key when encrypting and for an unwrapped
//! data key when decrypting. Calls may suspend (network, HSM); they are the
//! only suspension points in an encrypt or decrypt operation.

use async_trait::async_trait;
use sealframe_crypto::{AlgorithmSuite, DataKey};
use sealframe_proto::{EncryptedDataKey, EncryptionContext};
use thiserror::Error;

/// Errors reported by a materials manager.
///
/// These are passed to the caller unchanged, wrapped in
/// [`SessionFault::Collaborator`](crate::SessionFault::Collaborator).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterialsError {
    /// None of the encrypted data keys could be unwrapped
    #[error("no encrypted data key could be decrypted")]
    NoDecryptableKey,

    /// The caller is not authorized to use the master key
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// A provider could not be reached
    #[error("provider {provider_id} unavailable: {reason}")]
    ProviderUnavailable {
        /// Provider that failed
        provider_id: String,
        /// Provider-supplied reason
        reason: String,
    },

    /// The manager refuses this suite
    #[error("suite {suite_id:#06x} not supported by materials manager")]
    UnsupportedSuite {
        /// Requested suite
        suite_id: u16,
    },

    /// Any other manager-specific failure
    #[error("materials manager error: {0}")]
    Other(String),
}

/// Output of [`MaterialsManager::generate_data_key`].
#[derive(Debug)]
pub struct EncryptionMaterials {
    /// Plaintext data key, zeroized when dropped
    pub data_key: DataKey,
    /// The same data key wrapped by each master key
    pub encrypted_data_keys: Vec<EncryptedDataKey>,
}

/// What a session needs from the materials manager.
///
/// Emitted by sessions inside
/// [`SessionAction::RequestDataKey`](crate::SessionAction::RequestDataKey).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRequest {
    /// Generate and wrap a fresh data key
    Generate {
        /// Suite the data key is for
        suite: &'static AlgorithmSuite,
        /// Context that will be bound to the message, including reserved keys
        context: EncryptionContext,
    },
    /// Unwrap one of the message's data keys
    Decrypt {
        /// Suite named in the header
        suite: &'static AlgorithmSuite,
        /// Wrapped keys from the header
        encrypted_data_keys: Vec<EncryptedDataKey>,
        /// Context from the header, including reserved keys
        context: EncryptionContext,
    },
}

impl KeyRequest {
    /// Suite the request is for.
    pub fn suite(&self) -> &'static AlgorithmSuite {
        match self {
            Self::Generate { suite, .. } | Self::Decrypt { suite, .. } => suite,
        }
    }
}

/// Result of executing a [`KeyRequest`].
#[derive(Debug)]
pub enum KeyResponse {
    /// Answer to [`KeyRequest::Generate`]
    Materials(EncryptionMaterials),
    /// Answer to [`KeyRequest::Decrypt`]
    DataKey(DataKey),
}

/// Cryptographic materials manager.
///
/// Implementations must be safe to share between concurrent sessions.
#[async_trait]
pub trait MaterialsManager: Send + Sync {
    /// Generate a data key for `suite` and wrap it under every configured
    /// master key.
    ///
    /// The returned data key must be `suite.data_key_len` bytes and at least
    /// one encrypted data key must be returned.
    async fn generate_data_key(
        &self,
        suite: &'static AlgorithmSuite,
        context: &EncryptionContext,
    ) -> Result<EncryptionMaterials, MaterialsError>;

    /// Unwrap one of `encrypted_data_keys`.
    async fn decrypt_data_key(
        &self,
        suite: &'static AlgorithmSuite,
        encrypted_data_keys: &[EncryptedDataKey],
        context: &EncryptionContext,
    ) -> Result<DataKey, MaterialsError>;

    /// Execute a session's key request.
    async fn fulfill(&self, request: &KeyRequest) -> Result<KeyResponse, MaterialsError> {
        match request {
            KeyRequest::Generate { suite, context } => {
                self.generate_data_key(suite, context).await.map(KeyResponse::Materials)
            },
            KeyRequest::Decrypt { suite, encrypted_data_keys, context } => self
                .decrypt_data_key(suite, encrypted_data_keys, context)
                .await
                .map(KeyResponse::DataKey),
        }
    }
}
