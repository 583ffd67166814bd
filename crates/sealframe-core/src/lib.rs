//! Sealframe engine
//!
//! Envelope encryption of byte streams. A fresh data key per message is
//! obtained from a caller-supplied materials manager, a content key and key
//! commitment are derived from it, and the plaintext is sealed into the
//! framed message format of [`sealframe_proto`].
//!
//! # Architecture
//!
//! The engine follows the Sans-IO, action-based pattern. [`Encryptor`] and
//! [`Decryptor`] are pure state machines: they take bytes and key material and
//! return [`SessionAction`]s. The [`driver`] module executes those actions,
//! calling the [`MaterialsManager`] under a timeout and moving bytes between
//! async readers and writers.
//!
//! ```text
//! plaintext ──> Encryptor ──RequestDataKey──> driver ──> MaterialsManager
//!                   │  <──────materials───────────┘
//!                   └──Output──> header | frames | trailer
//! ```
//!
//! # Components
//!
//! - [`Encryptor`] / [`Decryptor`]: streaming session state machines
//! - [`MaterialsManager`]: contract for data key generation and unwrapping
//! - [`SessionConfig`]: frame length, commitment policy and resource bounds
//! - [`SessionError`]: every failure, classified by [`ErrorKind`]
//! - [`error_table`]: process-wide registry of numeric error codes

pub mod config;
pub mod driver;
pub mod env;
pub mod error;
pub mod error_table;
pub mod materials;
pub mod session;

pub use config::{CommitmentPolicy, SessionConfig};
pub use driver::{DecryptOutput, EncryptOutput, StreamSummary, decrypt, encrypt};
pub use env::{Environment, SystemEnv};
pub use error::{ErrorContext, ErrorKind, SessionError, SessionFault};
pub use error_table::{ErrorInfo, describe, register_error_table};
pub use materials::{
    EncryptionMaterials, KeyRequest, KeyResponse, MaterialsError, MaterialsManager,
};
pub use session::{
    Decryptor, EncryptRequest, Encryptor, RESERVED_PUBLIC_KEY, SessionAction, SessionState,
};
