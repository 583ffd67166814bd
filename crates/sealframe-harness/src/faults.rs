//! Fault-injecting materials managers.
//!
//! Wrappers and stand-ins that make the materials manager misbehave in
//! controlled ways: random failures at a seeded rate, fixed errors, answers
//! that never arrive or arrive late, and data keys of the wrong length.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sealframe_core::{EncryptionMaterials, MaterialsError, MaterialsManager};
use sealframe_crypto::{AlgorithmSuite, DataKey};
use sealframe_proto::{EncryptedDataKey, EncryptionContext};

/// Materials manager wrapper that randomly fails calls.
///
/// Delegates to `inner` but fails each call with probability `failure_rate`,
/// drawn from a seeded RNG so a run can be reproduced. Clones share the RNG
/// and the call counter.
#[derive(Clone)]
pub struct ChaoticManager<M> {
    inner: M,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaCha20Rng>>,
    calls: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl<M: MaterialsManager> ChaoticManager<M> {
    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: M, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            calls: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wrapped manager.
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Calls attempted, failed or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Calls that were failed on purpose.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    fn roll(&self) -> Result<(), MaterialsError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let fail = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(self.failure_rate);

        if fail {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(calls = self.calls(), "injecting materials failure");
            return Err(MaterialsError::ProviderUnavailable {
                provider_id: "chaos".to_owned(),
                reason: "chaotic failure injection".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<M: MaterialsManager> MaterialsManager for ChaoticManager<M> {
    async fn generate_data_key(
        &self,
        suite: &'static AlgorithmSuite,
        context: &EncryptionContext,
    ) -> Result<EncryptionMaterials, MaterialsError> {
        self.roll()?;
        self.inner.generate_data_key(suite, context).await
    }

    async fn decrypt_data_key(
        &self,
        suite: &'static AlgorithmSuite,
        encrypted_data_keys: &[EncryptedDataKey],
        context: &EncryptionContext,
    ) -> Result<DataKey, MaterialsError> {
        self.roll()?;
        self.inner.decrypt_data_key(suite, encrypted_data_keys, context).await
    }
}

/// Manager that fails every call with the same error.
#[derive(Debug, Clone)]
pub struct FailingManager(pub MaterialsError);

#[async_trait]
impl MaterialsManager for FailingManager {
    async fn generate_data_key(
        &self,
        _suite: &'static AlgorithmSuite,
        _context: &EncryptionContext,
    ) -> Result<EncryptionMaterials, MaterialsError> {
        Err(self.0.clone())
    }

    async fn decrypt_data_key(
        &self,
        _suite: &'static AlgorithmSuite,
        _encrypted_data_keys: &[EncryptedDataKey],
        _context: &EncryptionContext,
    ) -> Result<DataKey, MaterialsError> {
        Err(self.0.clone())
    }
}

/// Manager that never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StallingManager;

#[async_trait]
impl MaterialsManager for StallingManager {
    async fn generate_data_key(
        &self,
        _suite: &'static AlgorithmSuite,
        _context: &EncryptionContext,
    ) -> Result<EncryptionMaterials, MaterialsError> {
        std::future::pending().await
    }

    async fn decrypt_data_key(
        &self,
        _suite: &'static AlgorithmSuite,
        _encrypted_data_keys: &[EncryptedDataKey],
        _context: &EncryptionContext,
    ) -> Result<DataKey, MaterialsError> {
        std::future::pending().await
    }
}

/// Manager that answers after a fixed delay.
#[derive(Debug, Clone)]
pub struct DelayedManager<M> {
    inner: M,
    delay: Duration,
}

impl<M: MaterialsManager> DelayedManager<M> {
    /// Delay every call to `inner` by `delay`.
    pub fn new(inner: M, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<M: MaterialsManager> MaterialsManager for DelayedManager<M> {
    async fn generate_data_key(
        &self,
        suite: &'static AlgorithmSuite,
        context: &EncryptionContext,
    ) -> Result<EncryptionMaterials, MaterialsError> {
        tokio::time::sleep(self.delay).await;
        self.inner.generate_data_key(suite, context).await
    }

    async fn decrypt_data_key(
        &self,
        suite: &'static AlgorithmSuite,
        encrypted_data_keys: &[EncryptedDataKey],
        context: &EncryptionContext,
    ) -> Result<DataKey, MaterialsError> {
        tokio::time::sleep(self.delay).await;
        self.inner.decrypt_data_key(suite, encrypted_data_keys, context).await
    }
}

/// Manager that truncates every data key it hands out by one byte.
#[derive(Debug, Clone)]
pub struct ShortKeyManager<M>(pub M);

#[async_trait]
impl<M: MaterialsManager> MaterialsManager for ShortKeyManager<M> {
    async fn generate_data_key(
        &self,
        suite: &'static AlgorithmSuite,
        context: &EncryptionContext,
    ) -> Result<EncryptionMaterials, MaterialsError> {
        let materials = self.0.generate_data_key(suite, context).await?;
        Ok(EncryptionMaterials {
            data_key: shorten(&materials.data_key),
            encrypted_data_keys: materials.encrypted_data_keys,
        })
    }

    async fn decrypt_data_key(
        &self,
        suite: &'static AlgorithmSuite,
        encrypted_data_keys: &[EncryptedDataKey],
        context: &EncryptionContext,
    ) -> Result<DataKey, MaterialsError> {
        let data_key = self.0.decrypt_data_key(suite, encrypted_data_keys, context).await?;
        Ok(shorten(&data_key))
    }
}

fn shorten(data_key: &DataKey) -> DataKey {
    let bytes = data_key.as_bytes();
    DataKey::from_slice(&bytes[..bytes.len().saturating_sub(1)])
}
