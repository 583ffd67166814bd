//! Ciphertext surgery for negative tests.
//!
//! [`MessageLayout`] locates every field of a sealed message by byte range so
//! tests can corrupt exactly one of them, or move whole frames around, and
//! assert which failure decryption reports.

use std::ops::Range;

use sealframe_crypto::COMMITMENT_LEN;
use sealframe_proto::{
    ContentType, DecodeLimits, Frame, MAX_NON_FRAMED_LEN, MessageHeader, NonFramedBody,
    ProtocolError, Trailer,
};

/// Position of one frame, or of the single non-framed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    /// Sequence number on the wire
    pub sequence_number: u32,
    /// Last frame of the body
    pub is_final: bool,
    /// The whole encoded frame
    pub range: Range<usize>,
    /// Frame IV
    pub iv: Range<usize>,
    /// Encrypted content
    pub ciphertext: Range<usize>,
    /// Authentication tag
    pub tag: Range<usize>,
}

/// Byte ranges of every part of a well-formed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLayout {
    /// Parsed header
    pub header: MessageHeader,
    /// The whole encoded header
    pub header_range: Range<usize>,
    /// Header authentication tag
    pub header_tag: Range<usize>,
    /// Stored key commitment, for committing suites
    pub commitment: Option<Range<usize>>,
    /// Frames in wire order; one entry for a non-framed body
    pub frames: Vec<FrameLayout>,
    /// Signature trailer, for signed suites
    pub trailer: Option<Range<usize>>,
}

impl MessageLayout {
    /// Locate the parts of `message`. Bytes after the message are ignored.
    ///
    /// # Errors
    ///
    /// Returns the decoding error if `message` is not a complete message.
    pub fn parse(message: &[u8]) -> Result<Self, ProtocolError> {
        let decoded = MessageHeader::decode(message, &DecodeLimits::default())?;
        let header = decoded.header;
        let suite = header.suite;

        let header_range = 0..decoded.encoded_len;
        let header_tag = decoded.encoded_len - suite.aead_tag_len..decoded.encoded_len;
        let commitment = header
            .commitment
            .map(|_| decoded.authenticated_len - COMMITMENT_LEN..decoded.authenticated_len);

        let mut frames = Vec::new();
        let mut offset = decoded.encoded_len;

        if header.content_type == ContentType::NonFramed {
            let (body, used) =
                NonFramedBody::decode(&message[offset..], suite, MAX_NON_FRAMED_LEN)?;
            let iv = offset..offset + suite.aead_iv_len;
            let ciphertext_start = iv.end + 8;
            frames.push(FrameLayout {
                sequence_number: 1,
                is_final: true,
                range: offset..offset + used,
                iv,
                ciphertext: ciphertext_start..ciphertext_start + body.ciphertext.len(),
                tag: offset + used - suite.aead_tag_len..offset + used,
            });
            offset += used;
        } else {
            loop {
                let (frame, used) = Frame::decode(&message[offset..], suite, header.frame_length)?;
                frames.push(frame_layout(&frame, offset, used, suite.aead_iv_len));
                offset += used;
                if frame.is_final {
                    break;
                }
            }
        }

        let trailer = if suite.is_signed() {
            let (_, used) = Trailer::decode(&message[offset..])?;
            Some(offset..offset + used)
        } else {
            None
        };

        Ok(Self { header, header_range, header_tag, commitment, frames, trailer })
    }

    /// Offset where the body starts.
    pub fn body_start(&self) -> usize {
        self.header_range.end
    }

    /// Offset where the body ends and the trailer, if any, starts.
    pub fn body_end(&self) -> usize {
        self.frames.last().map_or(self.body_start(), |frame| frame.range.end)
    }
}

fn frame_layout(frame: &Frame, offset: usize, used: usize, iv_len: usize) -> FrameLayout {
    let prefix = if frame.is_final { 8 } else { 4 };
    let iv = offset + prefix..offset + prefix + iv_len;
    let ciphertext_start = if frame.is_final { iv.end + 4 } else { iv.end };
    let end = offset + used;

    FrameLayout {
        sequence_number: frame.sequence_number,
        is_final: frame.is_final,
        range: offset..end,
        iv,
        ciphertext: ciphertext_start..ciphertext_start + frame.ciphertext.len(),
        tag: ciphertext_start + frame.ciphertext.len()..end,
    }
}

/// Flip one bit in place.
pub fn flip_bit(message: &mut [u8], index: usize, bit: u8) {
    message[index] ^= 1 << (bit % 8);
}

/// Copy of `message` with frames `a` and `b` exchanged.
///
/// Both frames must be regular frames of the same size.
pub fn swap_frames(message: &[u8], layout: &MessageLayout, a: usize, b: usize) -> Vec<u8> {
    let (a, b) = (&layout.frames[a].range, &layout.frames[b].range);
    let mut out = message.to_vec();
    out[a.clone()].copy_from_slice(&message[b.clone()]);
    out[b.clone()].copy_from_slice(&message[a.clone()]);
    out
}

/// Copy of `message` with frame `index` repeated right after itself.
pub fn duplicate_frame(message: &[u8], layout: &MessageLayout, index: usize) -> Vec<u8> {
    let range = &layout.frames[index].range;
    let mut out = Vec::with_capacity(message.len() + range.len());
    out.extend_from_slice(&message[..range.end]);
    out.extend_from_slice(&message[range.clone()]);
    out.extend_from_slice(&message[range.end..]);
    out
}

/// Copy of `message` without frame `index`.
pub fn drop_frame(message: &[u8], layout: &MessageLayout, index: usize) -> Vec<u8> {
    let range = &layout.frames[index].range;
    let mut out = message[..range.start].to_vec();
    out.extend_from_slice(&message[range.end..]);
    out
}
