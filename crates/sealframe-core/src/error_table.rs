//! Process-wide error code registry.
//!
//! Hosts that report errors by number (FFI layers, logs, metrics) register
//! the engine's codes once at startup and look descriptions up later.
//! Registration only adds descriptive entries; it has no effect on how any
//! session behaves.

use std::{
    collections::BTreeMap,
    sync::{OnceLock, PoisonError, RwLock},
};

use crate::error::ErrorKind;

/// One registered error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Numeric code
    pub code: u16,
    /// Symbolic name
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
}

/// The engine's error codes, one per [`ErrorKind`].
pub const ERROR_TABLE: [ErrorInfo; 5] = [
    ErrorInfo {
        code: 0x2000,
        name: "UNSUPPORTED_FORMAT",
        description: "Unknown suite, message version or malformed header",
    },
    ErrorInfo {
        code: 0x2001,
        name: "BAD_CIPHERTEXT",
        description: "Bad ciphertext",
    },
    ErrorInfo {
        code: 0x2002,
        name: "COLLABORATOR",
        description: "Cryptographic materials manager failed or timed out",
    },
    ErrorInfo {
        code: 0x2003,
        name: "RESOURCE_LIMIT",
        description: "Configured resource limit exceeded",
    },
    ErrorInfo {
        code: 0x2004,
        name: "USAGE",
        description: "Invalid session state, request or configuration",
    },
];

fn registry() -> &'static RwLock<BTreeMap<u16, ErrorInfo>> {
    static REGISTRY: OnceLock<RwLock<BTreeMap<u16, ErrorInfo>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(BTreeMap::new()))
}

/// Register the engine's error codes.
///
/// Idempotent and safe to call from any thread. Returns the number of
/// entries this call added, so only the first call returns non-zero.
pub fn register_error_table() -> usize {
    register_entries(&ERROR_TABLE)
}

/// Merge arbitrary entries into the registry.
///
/// Existing codes are left untouched. Returns the number of entries added.
pub fn register_entries(entries: &[ErrorInfo]) -> usize {
    // A poisoned lock only means another thread panicked mid-insert; every
    // insert is a single map operation, so the map is still consistent.
    let mut table = registry().write().unwrap_or_else(PoisonError::into_inner);

    let mut added = 0;
    for entry in entries {
        if !table.contains_key(&entry.code) {
            table.insert(entry.code, *entry);
            added += 1;
        }
    }

    if added > 0 {
        tracing::debug!(added, total = table.len(), "registered error codes");
    }

    added
}

/// Look up a registered code.
pub fn describe(code: u16) -> Option<ErrorInfo> {
    registry().read().unwrap_or_else(PoisonError::into_inner).get(&code).copied()
}

/// Table entry for an error kind, whether or not it has been registered.
pub fn info_for(kind: ErrorKind) -> ErrorInfo {
    let code = kind.code();
    let index = usize::from(code - ERROR_TABLE[0].code);
    debug_assert_eq!(ERROR_TABLE[index].code, code);
    ERROR_TABLE[index]
}
