//! Reproducible encrypt/decrypt scenarios.
//!
//! A [`Scenario`] fixes everything that varies between runs (seed, suite,
//! frame length, policy, context) and seals a plaintext through the async
//! driver with a [`KeyringManager`]. The resulting [`Sealed`] message can be
//! opened again by the same keyring, or handed to the tamper helpers.

use sealframe_core::{
    CommitmentPolicy, DecryptOutput, EncryptOutput, EncryptRequest, SessionConfig, SessionError,
    driver,
};
use sealframe_crypto::SuiteId;
use sealframe_proto::EncryptionContext;

use crate::{KeyringManager, SimEnv};

/// Builder for one encrypt run.
#[derive(Debug, Clone)]
pub struct Scenario {
    seed: u64,
    suite_id: Option<SuiteId>,
    config: SessionConfig,
    context: EncryptionContext,
}

impl Scenario {
    /// Scenario with default configuration and an empty context.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            suite_id: None,
            config: SessionConfig::default(),
            context: EncryptionContext::new(),
        }
    }

    /// Encrypt with `suite_id` instead of the configured default.
    #[must_use]
    pub fn suite(mut self, suite_id: SuiteId) -> Self {
        self.suite_id = Some(suite_id);
        self
    }

    /// Frame length, zero for a non-framed body.
    #[must_use]
    pub fn frame_length(mut self, frame_length: u32) -> Self {
        self.config.frame_length = frame_length;
        self
    }

    /// Commitment policy for both directions.
    #[must_use]
    pub fn policy(mut self, policy: CommitmentPolicy) -> Self {
        self.config.commitment_policy = policy;
        self
    }

    /// Add an encryption context entry.
    #[must_use]
    pub fn context(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Replace the whole session configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Configuration the scenario runs with.
    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Seal `plaintext`.
    pub async fn seal(&self, plaintext: &[u8]) -> Result<Sealed, SessionError> {
        let env = SimEnv::with_seed(self.seed);
        let keyring = KeyringManager::new(env.clone()).with_generated_key("primary");

        let mut request = EncryptRequest::new(self.context.clone());
        if let Some(suite_id) = self.suite_id {
            request = request.with_suite(suite_id);
        }

        let output = driver::encrypt(&keyring, &env, &self.config, request, plaintext).await?;
        tracing::debug!(
            seed = self.seed,
            suite_id = output.header.suite.id,
            len = output.ciphertext.len(),
            "scenario sealed"
        );

        Ok(Sealed { output, keyring, config: self.config.clone() })
    }
}

/// A sealed message and the keyring that can open it.
pub struct Sealed {
    /// Encrypt result
    pub output: EncryptOutput,
    /// Keyring holding the master key
    pub keyring: KeyringManager<SimEnv>,
    /// Configuration the message was sealed with
    pub config: SessionConfig,
}

impl std::fmt::Debug for Sealed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sealed")
            .field("output", &self.output)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Sealed {
    /// Ciphertext bytes.
    pub fn ciphertext(&self) -> &[u8] {
        &self.output.ciphertext
    }

    /// Decrypt the original ciphertext.
    pub async fn open(&self) -> Result<DecryptOutput, SessionError> {
        self.open_bytes(self.ciphertext()).await
    }

    /// Decrypt other bytes with the same keyring and configuration.
    pub async fn open_bytes(&self, ciphertext: &[u8]) -> Result<DecryptOutput, SessionError> {
        driver::decrypt(&self.keyring, &self.config, ciphertext).await
    }
}
