//! Invariant checking for sealed messages.
//!
//! Invariants are structural properties every message produced by an
//! [`Encryptor`](sealframe_core::Encryptor) must satisfy, whatever the suite,
//! frame length or plaintext. Tests capture a [`MessageSnapshot`] and run an
//! [`InvariantRegistry`] against it.
//!
//! # Usage
//!
//! ```ignore
//! let snapshot = MessageSnapshot::capture(&ciphertext, plaintext.len())?;
//! InvariantRegistry::standard().assert_all(&snapshot, "after encrypt");
//! ```

mod checks;
mod snapshot;

pub use checks::{
    CiphertextCoversPlaintext, FramesFollowFrameLength, NoTrailingBytes, SequenceContiguity,
    SuiteFeaturesPresent,
};
pub use snapshot::MessageSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a sealed message.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a message.
    fn check(&self, state: &MessageSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every standard message invariant.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(FramesFollowFrameLength);
        registry.add(SequenceContiguity);
        registry.add(CiphertextCoversPlaintext);
        registry.add(SuiteFeaturesPresent);
        registry.add(NoTrailingBytes);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants, collecting every violation.
    pub fn check_all(&self, state: &MessageSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &MessageSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
