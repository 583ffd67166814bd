//! Sealframe message format
//!
//! Binary codec for encrypted messages. A message is a header, a body and
//! (for signed suites) a signature trailer:
//!
//! ```text
//! [header] [frame 1] ... [frame n-1] [final frame] [trailer]
//! [header] [non-framed body] [trailer]
//! ```
//!
//! All integers are big endian. This crate performs no cryptography; it
//! parses and produces bytes and builds the AAD and IV values the session
//! layer feeds to the AEAD.
//!
//! # Decoding untrusted input
//!
//! - Every length and count is checked against the remaining input before it
//!   is used, so no field can cause an over-read or an oversized allocation.
//! - Incomplete input yields [`ProtocolError::Truncated`], which streaming
//!   callers treat as "wait for more bytes" rather than a failure.
//! - Decoders report how many bytes they consumed, so callers can hash and
//!   advance over exactly the bytes that were parsed.

mod codec;
pub mod context;
pub mod edk;
pub mod errors;
pub mod frame;
pub mod header;
pub mod trailer;

pub use context::{EncryptionContext, encode_context, encoded_context_len};
pub use edk::EncryptedDataKey;
pub use errors::{ProtocolError, Result};
pub use frame::{
    BodyKind, FINAL_FRAME_MARKER, Frame, MAX_NON_FRAMED_LEN, MAX_SEQUENCE_NUMBER, NonFramedBody,
    SINGLE_BLOCK_SEQUENCE_NUMBER, body_aad, frame_iv,
};
pub use header::{ContentType, DecodeLimits, DecodedHeader, MessageHeader};
pub use trailer::Trailer;
