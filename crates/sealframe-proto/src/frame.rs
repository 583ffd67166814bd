//! Message body: frames and the non-framed single block.
//!
//! A framed body is a sequence of regular frames followed by exactly one
//! final frame:
//!
//! ```text
//! regular: u32 seq | [iv_len] iv | [frame_length] ciphertext | [tag_len] tag
//! final:   u32 0xFFFFFFFF | u32 seq | [iv_len] iv | u32 content_len
//!          | [content_len] ciphertext | [tag_len] tag
//! ```
//!
//! A non-framed body is a single AEAD block:
//!
//! ```text
//! [iv_len] iv | u64 content_len | [content_len] ciphertext | [tag_len] tag
//! ```
//!
//! Every block is sealed with [`body_aad`], which binds it to the message id,
//! its kind, its position and its length. IVs are derived from the sequence
//! number by [`frame_iv`]; they are never random and never repeat within a
//! message.

use bytes::{BufMut, Bytes};
use sealframe_crypto::AlgorithmSuite;

use crate::{
    codec::Reader,
    errors::{ProtocolError, Result},
};

/// Sequence field value that marks a final frame.
pub const FINAL_FRAME_MARKER: u32 = 0xFFFF_FFFF;

/// Largest usable sequence number.
pub const MAX_SEQUENCE_NUMBER: u32 = FINAL_FRAME_MARKER - 1;

/// Sequence number of a non-framed body's single block.
pub const SINGLE_BLOCK_SEQUENCE_NUMBER: u32 = 1;

/// Largest non-framed body: the GCM limit for one IV, minus one block margin.
pub const MAX_NON_FRAMED_LEN: u64 = (1 << 36) - 32;

/// Kind of body block, used to select the AAD label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Regular (non-final) frame
    Frame,
    /// Final frame
    FinalFrame,
    /// Non-framed single block
    SingleBlock,
}

impl BodyKind {
    /// AAD label for this kind.
    pub fn label(self) -> &'static [u8] {
        match self {
            Self::Frame => b"SealframeFrame",
            Self::FinalFrame => b"SealframeFinalFrame",
            Self::SingleBlock => b"SealframeSingleBlock",
        }
    }
}

/// AAD for one body block: `message_id || label || u32 seq || u64 content_len`.
pub fn body_aad(
    message_id: &[u8],
    kind: BodyKind,
    sequence_number: u32,
    content_len: u64,
) -> Vec<u8> {
    let label = kind.label();
    let mut aad = Vec::with_capacity(message_id.len() + label.len() + 12);
    aad.extend_from_slice(message_id);
    aad.extend_from_slice(label);
    aad.put_u32(sequence_number);
    aad.put_u64(content_len);
    aad
}

/// Deterministic IV for a sequence number.
///
/// The sequence number is written big endian into the last four bytes of an
/// otherwise zero IV.
pub fn frame_iv(suite: &AlgorithmSuite, sequence_number: u32) -> Vec<u8> {
    let mut iv = vec![0u8; suite.aead_iv_len];
    let iv_len = iv.len();
    let offset = iv_len.saturating_sub(4);
    iv[offset..].copy_from_slice(&sequence_number.to_be_bytes()[4 - (iv_len - offset)..]);
    iv
}

/// One encrypted frame.
///
/// # Invariants
///
/// - `sequence_number` is in `1..=MAX_SEQUENCE_NUMBER`
/// - regular frames carry exactly `frame_length` ciphertext bytes, final
///   frames at most `frame_length`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position in the body, starting at 1
    pub sequence_number: u32,
    /// Whether this is the final frame
    pub is_final: bool,
    /// AEAD IV as carried on the wire
    pub iv: Bytes,
    /// Encrypted content
    pub ciphertext: Bytes,
    /// AEAD tag
    pub tag: Bytes,
}

impl Frame {
    /// Kind used for this frame's AAD.
    pub fn kind(&self) -> BodyKind {
        if self.is_final { BodyKind::FinalFrame } else { BodyKind::Frame }
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        let fixed = if self.is_final { 12 } else { 4 };
        fixed + self.iv.len() + self.ciphertext.len() + self.tag.len()
    }

    /// Encode the frame.
    ///
    /// # Errors
    ///
    /// - `InvalidSequenceNumber` if the sequence number is zero or the marker
    /// - `FrameContentLength` if a regular frame is not exactly
    ///   `frame_length` bytes
    /// - `FinalFrameTooLong` if a final frame exceeds `frame_length`
    pub fn encode(&self, frame_length: u32, dst: &mut impl BufMut) -> Result<()> {
        check_sequence_number(self.sequence_number)?;

        if self.is_final {
            let content_len = u32::try_from(self.ciphertext.len()).map_err(|_| {
                ProtocolError::FinalFrameTooLong { content_len: u32::MAX, frame_length }
            })?;
            if content_len > frame_length {
                return Err(ProtocolError::FinalFrameTooLong { content_len, frame_length });
            }

            dst.put_u32(FINAL_FRAME_MARKER);
            dst.put_u32(self.sequence_number);
            dst.put_slice(&self.iv);
            dst.put_u32(content_len);
        } else {
            if self.ciphertext.len() != frame_length as usize {
                return Err(ProtocolError::FrameContentLength {
                    expected: frame_length as usize,
                    actual: self.ciphertext.len(),
                });
            }

            dst.put_u32(self.sequence_number);
            dst.put_slice(&self.iv);
        }

        dst.put_slice(&self.ciphertext);
        dst.put_slice(&self.tag);
        Ok(())
    }

    /// Decode one frame from the start of `bytes`.
    ///
    /// Returns the frame and the number of bytes it occupied. The IV and
    /// sequence number are returned as read; checking them against the
    /// expected values is the caller's job.
    ///
    /// # Errors
    ///
    /// - `Truncated` if `bytes` ends before the frame does
    /// - `InvalidSequenceNumber` for sequence number zero, or a final frame
    ///   whose sequence number is the marker
    /// - `FinalFrameTooLong` if the final content length exceeds
    ///   `frame_length`, checked before the content is read
    pub fn decode(
        bytes: &[u8],
        suite: &AlgorithmSuite,
        frame_length: u32,
    ) -> Result<(Self, usize)> {
        let mut reader = Reader::new(bytes);

        let first = reader.u32()?;
        let is_final = first == FINAL_FRAME_MARKER;
        let sequence_number = if is_final { reader.u32()? } else { first };
        check_sequence_number(sequence_number)?;

        let iv = Bytes::copy_from_slice(reader.take(suite.aead_iv_len)?);

        let content_len = if is_final {
            let content_len = reader.u32()?;
            if content_len > frame_length {
                return Err(ProtocolError::FinalFrameTooLong { content_len, frame_length });
            }
            content_len
        } else {
            frame_length
        };

        let ciphertext = Bytes::copy_from_slice(reader.take(content_len as usize)?);
        let tag = Bytes::copy_from_slice(reader.take(suite.aead_tag_len)?);

        Ok((Self { sequence_number, is_final, iv, ciphertext, tag }, reader.position()))
    }
}

fn check_sequence_number(sequence_number: u32) -> Result<()> {
    if sequence_number == 0 || sequence_number == FINAL_FRAME_MARKER {
        return Err(ProtocolError::InvalidSequenceNumber(sequence_number));
    }
    Ok(())
}

/// Non-framed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonFramedBody {
    /// AEAD IV as carried on the wire
    pub iv: Bytes,
    /// Encrypted content
    pub ciphertext: Bytes,
    /// AEAD tag
    pub tag: Bytes,
}

impl NonFramedBody {
    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        self.iv.len() + 8 + self.ciphertext.len() + self.tag.len()
    }

    /// Encode the body.
    ///
    /// # Errors
    ///
    /// - `BodyTooLarge` if the content exceeds [`MAX_NON_FRAMED_LEN`]
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let len = self.ciphertext.len() as u64;
        if len > MAX_NON_FRAMED_LEN {
            return Err(ProtocolError::BodyTooLarge { len, max: MAX_NON_FRAMED_LEN });
        }

        dst.put_slice(&self.iv);
        dst.put_u64(len);
        dst.put_slice(&self.ciphertext);
        dst.put_slice(&self.tag);
        Ok(())
    }

    /// Decode a non-framed body from the start of `bytes`.
    ///
    /// The declared length is checked against `max_len` (and the format
    /// maximum) before the content is read.
    ///
    /// # Errors
    ///
    /// - `Truncated` if `bytes` ends before the body does
    /// - `BodyTooLarge` if the declared length exceeds the limit
    pub fn decode(bytes: &[u8], suite: &AlgorithmSuite, max_len: u64) -> Result<(Self, usize)> {
        let mut reader = Reader::new(bytes);

        let iv = Bytes::copy_from_slice(reader.take(suite.aead_iv_len)?);
        let len = reader.u64()?;
        let max = max_len.min(MAX_NON_FRAMED_LEN);
        if len > max {
            return Err(ProtocolError::BodyTooLarge { len, max });
        }

        let len = usize::try_from(len).map_err(|_| ProtocolError::BodyTooLarge { len, max })?;
        let ciphertext = Bytes::copy_from_slice(reader.take(len)?);
        let tag = Bytes::copy_from_slice(reader.take(suite.aead_tag_len)?);

        Ok((Self { iv, ciphertext, tag }, reader.position()))
    }
}

#[cfg(test)]
mod tests {
    use sealframe_crypto::lookup;

    use super::*;

    fn suite() -> &'static AlgorithmSuite {
        lookup(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY).unwrap()
    }

    fn frame(sequence_number: u32, is_final: bool, len: usize) -> Frame {
        Frame {
            sequence_number,
            is_final,
            iv: Bytes::from(frame_iv(suite(), sequence_number)),
            ciphertext: Bytes::from(vec![0x5A; len]),
            tag: Bytes::from(vec![0x7E; 16]),
        }
    }

    #[test]
    fn iv_is_right_aligned_sequence_number() {
        assert_eq!(frame_iv(suite(), 1), hex::decode("000000000000000000000001").unwrap());
        assert_eq!(frame_iv(suite(), 0x0102_0304), [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn body_aad_layout() {
        let aad = body_aad(&[0xAA; 2], BodyKind::FinalFrame, 3, 1808);

        let mut expected = vec![0xAA, 0xAA];
        expected.extend_from_slice(b"SealframeFinalFrame");
        expected.extend_from_slice(&3u32.to_be_bytes());
        expected.extend_from_slice(&1808u64.to_be_bytes());
        assert_eq!(aad, expected);
    }

    #[test]
    fn labels_are_distinct() {
        assert_ne!(BodyKind::Frame.label(), BodyKind::FinalFrame.label());
        assert_ne!(BodyKind::FinalFrame.label(), BodyKind::SingleBlock.label());
    }

    #[test]
    fn regular_frame_roundtrip() {
        let original = frame(1, false, 64);
        let mut buf = Vec::new();
        original.encode(64, &mut buf).unwrap();
        assert_eq!(buf.len(), original.encoded_len());
        assert_eq!(&buf[..4], &[0, 0, 0, 1]);

        let (decoded, used) = Frame::decode(&buf, suite(), 64).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn final_frame_roundtrip() {
        let original = frame(3, true, 10);
        let mut buf = Vec::new();
        original.encode(64, &mut buf).unwrap();
        assert_eq!(&buf[..8], &[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 3]);

        let (decoded, used) = Frame::decode(&buf, suite(), 64).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.kind(), BodyKind::FinalFrame);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn empty_final_frame_roundtrip() {
        let original = frame(1, true, 0);
        let mut buf = Vec::new();
        original.encode(4096, &mut buf).unwrap();

        let (decoded, _) = Frame::decode(&buf, suite(), 4096).unwrap();
        assert!(decoded.ciphertext.is_empty());
    }

    #[test]
    fn short_regular_frame_rejected_on_encode() {
        let mut buf = Vec::new();
        assert_eq!(
            frame(1, false, 63).encode(64, &mut buf),
            Err(ProtocolError::FrameContentLength { expected: 64, actual: 63 })
        );
    }

    #[test]
    fn oversized_final_length_rejected_before_read() {
        let mut buf = Vec::new();
        frame(2, true, 64).encode(64, &mut buf).unwrap();

        // Decoding with a smaller frame length than the writer used
        assert_eq!(
            Frame::decode(&buf[..24], suite(), 32),
            Err(ProtocolError::FinalFrameTooLong { content_len: 64, frame_length: 32 })
        );
    }

    #[test]
    fn sequence_zero_rejected() {
        let mut buf = Vec::new();
        frame(1, false, 8).encode(8, &mut buf).unwrap();
        buf[3] = 0;

        assert_eq!(Frame::decode(&buf, suite(), 8), Err(ProtocolError::InvalidSequenceNumber(0)));
    }

    #[test]
    fn truncated_frame_needs_more_input() {
        let mut buf = Vec::new();
        frame(1, false, 32).encode(32, &mut buf).unwrap();

        for len in 0..buf.len() {
            assert!(Frame::decode(&buf[..len], suite(), 32).unwrap_err().is_incomplete());
        }
    }

    #[test]
    fn non_framed_roundtrip() {
        let body = NonFramedBody {
            iv: Bytes::from(frame_iv(suite(), SINGLE_BLOCK_SEQUENCE_NUMBER)),
            ciphertext: Bytes::from_static(b"ciphertext"),
            tag: Bytes::from(vec![1u8; 16]),
        };
        let mut buf = Vec::new();
        body.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), body.encoded_len());

        let (decoded, used) = NonFramedBody::decode(&buf, suite(), 1024).unwrap();
        assert_eq!(decoded, body);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn non_framed_length_limit() {
        let mut buf = vec![0u8; 12];
        buf.extend_from_slice(&u64::MAX.to_be_bytes());

        assert_eq!(
            NonFramedBody::decode(&buf, suite(), u64::MAX),
            Err(ProtocolError::BodyTooLarge { len: u64::MAX, max: MAX_NON_FRAMED_LEN })
        );
    }
}
