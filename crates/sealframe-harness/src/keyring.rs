//! In-memory materials manager.
//!
//! Wraps each data key with AES-256-GCM under every configured master key.
//! The encryption context is the wrapping AAD, so an EDK only unwraps for the
//! context it was produced for.
//!
//! EDK layout: `provider_id = "sealframe-keyring"`, `provider_info = key name`,
//! `ciphertext = nonce(12) | wrapped key | tag(16)`.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use async_trait::async_trait;
use sealframe_core::{EncryptionMaterials, Environment, MaterialsError, MaterialsManager};
use sealframe_crypto::{AlgorithmSuite, DataKey};
use sealframe_proto::{EncryptedDataKey, EncryptionContext, encode_context};

/// Provider id of EDKs produced by [`KeyringManager`].
pub const KEYRING_PROVIDER: &str = "sealframe-keyring";

const NONCE_LEN: usize = 12;

/// Materials manager holding named 256-bit master keys in memory.
pub struct KeyringManager<E: Environment> {
    env: E,
    keys: BTreeMap<String, [u8; 32]>,
    calls: AtomicUsize,
}

impl<E: Environment> KeyringManager<E> {
    /// Keyring with no master keys.
    pub fn new(env: E) -> Self {
        Self { env, keys: BTreeMap::new(), calls: AtomicUsize::new(0) }
    }

    /// Add a master key.
    #[must_use]
    pub fn with_key(mut self, name: impl Into<String>, key: [u8; 32]) -> Self {
        self.keys.insert(name.into(), key);
        self
    }

    /// Add a master key drawn from the environment.
    #[must_use]
    pub fn with_generated_key(self, name: impl Into<String>) -> Self {
        let key = self.env.random_array();
        self.with_key(name, key)
    }

    /// Number of generate and decrypt calls served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn wrap(
        &self,
        name: &str,
        master_key: &[u8; 32],
        data_key: &DataKey,
        aad: &[u8],
    ) -> Result<EncryptedDataKey, MaterialsError> {
        let cipher = cipher(master_key)?;
        let nonce: [u8; NONCE_LEN] = self.env.random_array();

        let wrapped = cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: data_key.as_bytes(), aad })
            .map_err(|_| MaterialsError::Other(format!("wrapping under {name} failed")))?;

        let mut ciphertext = Vec::with_capacity(NONCE_LEN + wrapped.len());
        ciphertext.extend_from_slice(&nonce);
        ciphertext.extend_from_slice(&wrapped);

        Ok(EncryptedDataKey::new(KEYRING_PROVIDER, name.as_bytes().to_vec(), ciphertext))
    }

    fn unwrap(&self, edk: &EncryptedDataKey, aad: &[u8]) -> Option<DataKey> {
        if edk.provider_id != KEYRING_PROVIDER || edk.ciphertext.len() < NONCE_LEN {
            return None;
        }

        let name = std::str::from_utf8(&edk.provider_info).ok()?;
        let master_key = self.keys.get(name)?;
        let (nonce, wrapped) = edk.ciphertext.split_at(NONCE_LEN);

        let plain = cipher(master_key)
            .ok()?
            .decrypt(Nonce::from_slice(nonce), Payload { msg: wrapped, aad })
            .ok()?;
        Some(DataKey::new(plain))
    }
}

fn cipher(master_key: &[u8; 32]) -> Result<Aes256Gcm, MaterialsError> {
    Aes256Gcm::new_from_slice(master_key)
        .map_err(|_| MaterialsError::Other("invalid master key length".to_owned()))
}

fn context_aad(context: &EncryptionContext) -> Result<Vec<u8>, MaterialsError> {
    let mut aad = Vec::new();
    encode_context(context, &mut aad).map_err(|err| MaterialsError::Other(err.to_string()))?;
    Ok(aad)
}

#[async_trait]
impl<E: Environment> MaterialsManager for KeyringManager<E> {
    async fn generate_data_key(
        &self,
        suite: &'static AlgorithmSuite,
        context: &EncryptionContext,
    ) -> Result<EncryptionMaterials, MaterialsError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if self.keys.is_empty() {
            return Err(MaterialsError::Other("keyring has no master keys".to_owned()));
        }

        let mut bytes = vec![0u8; suite.data_key_len];
        self.env.random_bytes(&mut bytes);
        let data_key = DataKey::new(bytes);

        let aad = context_aad(context)?;
        let encrypted_data_keys = self
            .keys
            .iter()
            .map(|(name, key)| self.wrap(name, key, &data_key, &aad))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            suite_id = suite.id,
            edks = encrypted_data_keys.len(),
            "data key generated"
        );

        Ok(EncryptionMaterials { data_key, encrypted_data_keys })
    }

    async fn decrypt_data_key(
        &self,
        _suite: &'static AlgorithmSuite,
        encrypted_data_keys: &[EncryptedDataKey],
        context: &EncryptionContext,
    ) -> Result<DataKey, MaterialsError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let aad = context_aad(context)?;
        encrypted_data_keys
            .iter()
            .find_map(|edk| self.unwrap(edk, &aad))
            .ok_or(MaterialsError::NoDecryptableKey)
    }
}

#[cfg(test)]
mod tests {
    use sealframe_crypto::lookup;

    use super::*;
    use crate::SimEnv;

    fn suite() -> &'static AlgorithmSuite {
        lookup(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY).unwrap()
    }

    fn context(value: &str) -> EncryptionContext {
        let mut context = EncryptionContext::new();
        context.insert("purpose".to_owned(), value.to_owned());
        context
    }

    #[tokio::test]
    async fn wraps_under_every_key() {
        let keyring = KeyringManager::new(SimEnv::with_seed(1))
            .with_generated_key("alpha")
            .with_generated_key("beta");

        let materials = keyring.generate_data_key(suite(), &context("a")).await.unwrap();
        assert_eq!(materials.data_key.len(), 32);
        assert_eq!(materials.encrypted_data_keys.len(), 2);

        let unwrapped = keyring
            .decrypt_data_key(suite(), &materials.encrypted_data_keys[1..], &context("a"))
            .await
            .unwrap();
        assert_eq!(unwrapped.as_bytes(), materials.data_key.as_bytes());
        assert_eq!(keyring.calls(), 2);
    }

    #[tokio::test]
    async fn context_is_bound() {
        let keyring = KeyringManager::new(SimEnv::with_seed(2)).with_generated_key("alpha");
        let materials = keyring.generate_data_key(suite(), &context("a")).await.unwrap();

        let err = keyring
            .decrypt_data_key(suite(), &materials.encrypted_data_keys, &context("b"))
            .await
            .unwrap_err();
        assert_eq!(err, MaterialsError::NoDecryptableKey);
    }

    #[tokio::test]
    async fn other_keyring_cannot_unwrap() {
        let ours = KeyringManager::new(SimEnv::with_seed(3)).with_key("alpha", [1; 32]);
        let theirs = KeyringManager::new(SimEnv::with_seed(4)).with_key("alpha", [2; 32]);

        let materials = ours.generate_data_key(suite(), &context("a")).await.unwrap();
        let err = theirs
            .decrypt_data_key(suite(), &materials.encrypted_data_keys, &context("a"))
            .await
            .unwrap_err();
        assert_eq!(err, MaterialsError::NoDecryptableKey);
    }

    #[tokio::test]
    async fn empty_keyring_refuses() {
        let keyring = KeyringManager::new(SimEnv::with_seed(5));
        assert!(keyring.generate_data_key(suite(), &context("a")).await.is_err());
    }
}
