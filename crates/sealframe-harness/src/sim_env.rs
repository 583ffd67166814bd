//! Seeded environment for reproducible runs.
//!
//! Every message id, signing key seed and data key drawn during a test comes
//! from one `ChaCha20` stream, so a failing case can be replayed exactly from
//! its seed.

#![allow(clippy::disallowed_types, reason = "Synchronous locking of RNG state only")]

use std::sync::{Arc, Mutex, PoisonError};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sealframe_core::Environment;

/// Deterministic [`Environment`] backed by a seeded `ChaCha20` RNG.
///
/// Clones share the RNG stream, so two sessions created from clones of one
/// `SimEnv` still draw distinct bytes.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    seed: u64,
}

impl SimEnv {
    /// Create an environment from a 64-bit seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))), seed }
    }

    /// Seed this environment was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("seed", &self.seed).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        // Each fill is a single RNG call; a poisoned lock leaves the stream
        // usable
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
