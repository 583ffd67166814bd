//! Observable facts about one sealed message.
//!
//! Invariants run against a [`MessageSnapshot`] rather than raw bytes, so
//! every check sees the same parse.

use sealframe_core::RESERVED_PUBLIC_KEY;
use sealframe_proto::ProtocolError;

use crate::tamper::MessageLayout;

/// A sealed message together with what it was sealed from.
#[derive(Debug, Clone)]
pub struct MessageSnapshot {
    /// Field positions of the message
    pub layout: MessageLayout,
    /// Length of the plaintext that was encrypted
    pub plaintext_len: usize,
    /// Length of the whole message
    pub message_len: usize,
}

impl MessageSnapshot {
    /// Parse `message`, sealed from `plaintext_len` bytes of plaintext.
    pub fn capture(message: &[u8], plaintext_len: usize) -> Result<Self, ProtocolError> {
        Ok(Self {
            layout: MessageLayout::parse(message)?,
            plaintext_len,
            message_len: message.len(),
        })
    }

    /// Frame length from the header, zero for non-framed messages.
    pub fn frame_length(&self) -> u32 {
        self.layout.header.frame_length
    }

    /// Whether the header context carries the trailer verification key.
    pub fn publishes_verifying_key(&self) -> bool {
        self.layout.header.encryption_context.contains_key(RESERVED_PUBLIC_KEY)
    }
}
