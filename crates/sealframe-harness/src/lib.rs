//! Deterministic test harness for the sealframe engine.
//!
//! Seeded implementations of the engine's collaborator traits, so every
//! encrypt and decrypt run in a test can be replayed from a single seed.
//!
//! # Components
//!
//! - [`SimEnv`]: `ChaCha20`-backed [`Environment`](sealframe_core::Environment)
//! - [`KeyringManager`]: in-memory AES-GCM key wrapping
//! - [`faults`]: managers that fail, stall, delay or return bad keys
//! - [`tamper`]: byte-range layout of a message for targeted corruption
//! - [`scenario`]: builder for reproducible encrypt/decrypt runs
//!
//! # Invariant Testing
//!
//! The `invariants` module checks structural properties every sealed message
//! must satisfy. Use [`InvariantRegistry::standard()`] for the full set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod invariants;
pub mod keyring;
pub mod scenario;
pub mod sim_env;
pub mod tamper;

pub use faults::{ChaoticManager, DelayedManager, FailingManager, ShortKeyManager, StallingManager};
pub use invariants::{Invariant, InvariantRegistry, InvariantResult, MessageSnapshot, Violation};
pub use keyring::{KEYRING_PROVIDER, KeyringManager};
pub use scenario::{Scenario, Sealed};
pub use sim_env::SimEnv;
pub use tamper::{FrameLayout, MessageLayout, drop_frame, duplicate_frame, flip_bit, swap_frames};

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG` and defaults to `warn`. Safe to call from every test;
/// only the first call installs anything.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}
