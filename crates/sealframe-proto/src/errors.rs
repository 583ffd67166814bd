//! Errors from encoding and decoding the message format.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Structural errors in the wire format.
///
/// None of these involve secret data: every variant is detected from lengths,
/// counts and tags before (or instead of) any cryptographic operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Input ended before the structure was complete
    #[error("truncated input: {needed} more bytes required")]
    Truncated {
        /// Minimum number of additional bytes needed to make progress
        needed: usize,
    },

    /// Header version byte is not supported
    #[error("unsupported message version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Header type byte is not supported
    #[error("unsupported message type: {0:#04x}")]
    UnsupportedMessageType(u8),

    /// Suite id is not registered
    #[error("unknown algorithm suite: {0:#06x}")]
    UnknownSuite(u16),

    /// Suite cannot be encoded with the header's version
    #[error("suite {suite_id:#06x} does not use message version {version}")]
    VersionMismatch {
        /// Suite identifier
        suite_id: u16,
        /// Version byte read from the header
        version: u8,
    },

    /// Content type byte is not supported
    #[error("unsupported content type: {0:#04x}")]
    UnsupportedContentType(u8),

    /// Reserved header bytes are not zero
    #[error("reserved header field is not zero")]
    ReservedNotZero,

    /// IV length field disagrees with the suite
    #[error("invalid iv length: expected {expected}, got {actual}")]
    InvalidIvLength {
        /// Suite IV length
        expected: usize,
        /// Length declared in the header
        actual: usize,
    },

    /// Message id length disagrees with the suite
    #[error("invalid message id length: expected {expected}, got {actual}")]
    InvalidMessageIdLength {
        /// Suite message id length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Frame length is inconsistent with the content type
    #[error("frame length {frame_length} is invalid for {content_type} content")]
    InvalidFrameLength {
        /// Content type name
        content_type: &'static str,
        /// Declared frame length
        frame_length: u32,
    },

    /// Frame length exceeds the configured bound
    #[error("frame length {frame_length} exceeds maximum {max}")]
    FrameTooLarge {
        /// Declared frame length
        frame_length: u32,
        /// Configured maximum
        max: u32,
    },

    /// Encryption context entries are unsorted, duplicated or empty
    #[error("encryption context is not canonical")]
    NonCanonicalContext,

    /// Declared encryption context length does not match its entries
    #[error("encryption context length mismatch: declared {declared}, used {actual}")]
    ContextLengthMismatch {
        /// Length field value
        declared: usize,
        /// Bytes consumed by the entries
        actual: usize,
    },

    /// A text field is not valid UTF-8
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Field name
        field: &'static str,
    },

    /// Header declares no encrypted data keys
    #[error("header contains no encrypted data keys")]
    NoEncryptedDataKeys,

    /// Header declares more encrypted data keys than allowed
    #[error("too many encrypted data keys: {count} exceeds maximum {max}")]
    TooManyEncryptedDataKeys {
        /// Declared count
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// Commitment presence does not match the suite
    #[error("key commitment presence does not match suite {suite_id:#06x}")]
    CommitmentMismatch {
        /// Suite identifier
        suite_id: u16,
    },

    /// A length-prefixed field is too long to encode
    #[error("{field} length {len} exceeds maximum {max}")]
    FieldTooLong {
        /// Field name
        field: &'static str,
        /// Actual length
        len: usize,
        /// Largest encodable length
        max: usize,
    },

    /// Sequence number is zero or collides with the final-frame marker
    #[error("invalid sequence number: {0}")]
    InvalidSequenceNumber(u32),

    /// Final frame is longer than the declared frame length
    #[error("final frame content length {content_len} exceeds frame length {frame_length}")]
    FinalFrameTooLong {
        /// Declared content length
        content_len: u32,
        /// Header frame length
        frame_length: u32,
    },

    /// Frame content does not match the layout it is encoded with
    #[error("frame content length {actual} does not match expected {expected}")]
    FrameContentLength {
        /// Expected content length
        expected: usize,
        /// Actual content length
        actual: usize,
    },

    /// Non-framed body exceeds the configured bound
    #[error("body length {len} exceeds maximum {max}")]
    BodyTooLarge {
        /// Declared body length
        len: u64,
        /// Configured maximum
        max: u64,
    },

    /// Trailer signature length is invalid
    #[error("invalid signature length: {0}")]
    InvalidSignatureLength(usize),
}

impl ProtocolError {
    /// True if decoding failed only because more input is required.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }

    /// True if the input exceeded a configured resource bound.
    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self,
            Self::FrameTooLarge { .. }
                | Self::TooManyEncryptedDataKeys { .. }
                | Self::BodyTooLarge { .. }
                | Self::FieldTooLong { .. }
        )
    }
}
