//! Message header.
//!
//! The header is the self-describing prefix of every message: it names the
//! algorithm suite, carries the message id, the encryption context and the
//! wrapped data keys, and describes how the body is laid out. It ends with an
//! AEAD tag over everything before it, computed with the message's content
//! key, so a header only becomes trustworthy once the data key is known.
//!
//! Two layouts exist, selected by the suite's message version:
//!
//! ```text
//! version 1:
//!   u8 0x01 | u8 0x80 | u16 suite_id | [16] message_id
//!   context | edks
//!   u8 content_type | [4] reserved | u8 iv_len | u32 frame_length
//!   [iv_len] header_iv | [tag_len] tag
//!
//! version 2:
//!   u8 0x02 | u16 suite_id | [32] message_id
//!   context | edks
//!   u8 content_type | u32 frame_length | [32] commitment
//!   [tag_len] tag
//! ```
//!
//! The authenticated portion is everything before `header_iv` (version 1) or
//! before `tag` (version 2).

use bytes::BufMut;
use sealframe_crypto::{AlgorithmSuite, COMMITMENT_LEN, CryptoError, MessageVersion};

use crate::{
    EncryptedDataKey, EncryptionContext,
    codec::Reader,
    context::{decode_context, encode_context},
    edk::{decode_edks, encode_edks},
    errors::{ProtocolError, Result},
};

/// Message type byte of version 1 headers (customer authenticated encrypted
/// data).
const MESSAGE_TYPE_V1: u8 = 0x80;

/// Body layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// Whole body is one AEAD block
    NonFramed,
    /// Body is a sequence of frames ending with a final frame
    Framed,
}

impl ContentType {
    /// Wire value.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::NonFramed => 0x01,
            Self::Framed => 0x02,
        }
    }

    /// Parse a wire value.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::NonFramed),
            0x02 => Ok(Self::Framed),
            other => Err(ProtocolError::UnsupportedContentType(other)),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::NonFramed => "non-framed",
            Self::Framed => "framed",
        }
    }
}

/// Bounds applied while decoding untrusted headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum number of encrypted data keys, `None` for unbounded
    pub max_encrypted_data_keys: Option<usize>,
    /// Maximum accepted frame length
    pub max_frame_length: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self { max_encrypted_data_keys: None, max_frame_length: 16 * 1024 * 1024 }
    }
}

/// Parsed message header.
///
/// # Invariants
///
/// - `message_id.len() == suite.message_id_len()`
/// - `encrypted_data_keys` is non-empty
/// - `frame_length == 0` iff `content_type == NonFramed`
/// - `header_iv` is `suite.aead_iv_len` bytes for version 1 suites and empty
///   for version 2 suites
/// - `commitment` is present iff the suite is committing (once the header has
///   been completed for encoding, or after decoding)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Algorithm suite, resolved from the registry
    pub suite: &'static AlgorithmSuite,
    /// Random per-message identifier
    pub message_id: Vec<u8>,
    /// Authenticated key/value pairs
    pub encryption_context: EncryptionContext,
    /// Data key wrapped by one or more providers
    pub encrypted_data_keys: Vec<EncryptedDataKey>,
    /// Body layout
    pub content_type: ContentType,
    /// Plaintext bytes per regular frame, zero for non-framed bodies
    pub frame_length: u32,
    /// IV for the header tag (version 1 only)
    pub header_iv: Vec<u8>,
    /// Key commitment (committing suites only)
    pub commitment: Option<[u8; COMMITMENT_LEN]>,
    /// AEAD tag over the authenticated bytes
    pub auth_tag: Vec<u8>,
}

/// Result of [`MessageHeader::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHeader {
    /// The header
    pub header: MessageHeader,
    /// Number of leading bytes covered by the header tag
    pub authenticated_len: usize,
    /// Total number of bytes the header occupied
    pub encoded_len: usize,
}

impl MessageHeader {
    /// Create a header awaiting its commitment and tag.
    ///
    /// # Errors
    ///
    /// - `InvalidMessageIdLength` if the id does not match the suite
    /// - `NoEncryptedDataKeys` if `encrypted_data_keys` is empty
    /// - `InvalidFrameLength` if `frame_length` contradicts `content_type`
    pub fn new(
        suite: &'static AlgorithmSuite,
        message_id: Vec<u8>,
        encryption_context: EncryptionContext,
        encrypted_data_keys: Vec<EncryptedDataKey>,
        content_type: ContentType,
        frame_length: u32,
    ) -> Result<Self> {
        if message_id.len() != suite.message_id_len() {
            return Err(ProtocolError::InvalidMessageIdLength {
                expected: suite.message_id_len(),
                actual: message_id.len(),
            });
        }

        if encrypted_data_keys.is_empty() {
            return Err(ProtocolError::NoEncryptedDataKeys);
        }

        check_frame_length(content_type, frame_length)?;

        let header_iv = match suite.message_version {
            MessageVersion::V1 => vec![0u8; suite.aead_iv_len],
            MessageVersion::V2 => Vec::new(),
        };

        Ok(Self {
            suite,
            message_id,
            encryption_context,
            encrypted_data_keys,
            content_type,
            frame_length,
            header_iv,
            commitment: None,
            auth_tag: Vec::new(),
        })
    }

    /// Message format version.
    pub fn version(&self) -> MessageVersion {
        self.suite.message_version
    }

    /// IV used for the header tag.
    ///
    /// Version 2 headers do not carry one and always use zeros.
    pub fn tag_iv(&self) -> Vec<u8> {
        match self.version() {
            MessageVersion::V1 => self.header_iv.clone(),
            MessageVersion::V2 => vec![0u8; self.suite.aead_iv_len],
        }
    }

    /// Bytes covered by the header tag.
    ///
    /// # Errors
    ///
    /// - `CommitmentMismatch` if commitment presence does not match the suite
    /// - `FieldTooLong` / `TooManyEncryptedDataKeys` if a section cannot be
    ///   encoded
    pub fn authenticated_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len_hint());
        self.encode_authenticated(&mut buf)?;
        Ok(buf)
    }

    /// Encode the complete header.
    ///
    /// # Errors
    ///
    /// - Everything [`Self::authenticated_bytes`] reports
    /// - `InvalidIvLength` if `header_iv` does not match the suite
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        self.encode_authenticated(dst)?;

        if self.version() == MessageVersion::V1 {
            if self.header_iv.len() != self.suite.aead_iv_len {
                return Err(ProtocolError::InvalidIvLength {
                    expected: self.suite.aead_iv_len,
                    actual: self.header_iv.len(),
                });
            }
            dst.put_slice(&self.header_iv);
        }

        dst.put_slice(&self.auth_tag);
        Ok(())
    }

    /// Encode the complete header into a new buffer.
    ///
    /// # Errors
    ///
    /// See [`Self::encode`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len_hint());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    fn encode_authenticated(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.commitment.is_some() != self.suite.is_committing() {
            return Err(ProtocolError::CommitmentMismatch { suite_id: self.suite.id });
        }

        dst.put_u8(self.version().to_u8());
        if self.version() == MessageVersion::V1 {
            dst.put_u8(MESSAGE_TYPE_V1);
        }
        dst.put_u16(self.suite.id);
        dst.put_slice(&self.message_id);

        encode_context(&self.encryption_context, dst)?;
        encode_edks(&self.encrypted_data_keys, dst)?;

        dst.put_u8(self.content_type.to_u8());
        match self.version() {
            MessageVersion::V1 => {
                let iv_len = u8::try_from(self.suite.aead_iv_len).map_err(|_| {
                    ProtocolError::FieldTooLong {
                        field: "iv length",
                        len: self.suite.aead_iv_len,
                        max: u8::MAX as usize,
                    }
                })?;
                dst.put_slice(&[0u8; 4]);
                dst.put_u8(iv_len);
                dst.put_u32(self.frame_length);
            },
            MessageVersion::V2 => {
                dst.put_u32(self.frame_length);
                if let Some(commitment) = &self.commitment {
                    dst.put_slice(commitment);
                }
            },
        }

        Ok(())
    }

    fn encoded_len_hint(&self) -> usize {
        64 + self.message_id.len()
            + crate::context::encoded_context_len(&self.encryption_context)
            + self.encrypted_data_keys.iter().map(EncryptedDataKey::encoded_len).sum::<usize>()
    }

    /// Decode a header from the start of `bytes`.
    ///
    /// Checks run in wire order and never depend on key material: version,
    /// message type, suite lookup, version/suite agreement, context
    /// canonicality, EDK count and bounds, content type, reserved bytes, IV
    /// length, frame length consistency and limits. The tag is returned
    /// unverified.
    ///
    /// # Errors
    ///
    /// - `Truncated` if `bytes` ends before the header does
    /// - Any structural error listed on [`ProtocolError`]
    ///
    /// # Security
    ///
    /// - Bounded: every length is checked against the remaining input before
    ///   it is used, and the EDK count limit is applied before any key is
    ///   parsed.
    /// - Unauthenticated: the returned header must not be trusted until its
    ///   tag has been verified with the content key.
    pub fn decode(bytes: &[u8], limits: &DecodeLimits) -> Result<DecodedHeader> {
        let mut reader = Reader::new(bytes);

        let version_byte = reader.u8()?;
        let version = MessageVersion::from_u8(version_byte)
            .ok_or(ProtocolError::UnsupportedVersion(version_byte))?;

        if version == MessageVersion::V1 {
            let message_type = reader.u8()?;
            if message_type != MESSAGE_TYPE_V1 {
                return Err(ProtocolError::UnsupportedMessageType(message_type));
            }
        }

        let suite_id = reader.u16()?;
        let suite = sealframe_crypto::lookup(suite_id).map_err(|err| match err {
            CryptoError::UnknownSuite { id } => ProtocolError::UnknownSuite(id),
            _ => ProtocolError::UnknownSuite(suite_id),
        })?;

        if suite.message_version != version {
            return Err(ProtocolError::VersionMismatch { suite_id, version: version_byte });
        }

        let message_id = reader.take(suite.message_id_len())?.to_vec();
        let encryption_context = decode_context(&mut reader)?;
        let encrypted_data_keys = decode_edks(&mut reader, limits.max_encrypted_data_keys)?;
        let content_type = ContentType::from_u8(reader.u8()?)?;

        let frame_length = match version {
            MessageVersion::V1 => {
                let reserved = reader.array::<4>()?;
                if reserved != [0u8; 4] {
                    return Err(ProtocolError::ReservedNotZero);
                }

                let iv_len = reader.u8()? as usize;
                if iv_len != suite.aead_iv_len {
                    return Err(ProtocolError::InvalidIvLength {
                        expected: suite.aead_iv_len,
                        actual: iv_len,
                    });
                }

                reader.u32()?
            },
            MessageVersion::V2 => reader.u32()?,
        };

        check_frame_length(content_type, frame_length)?;
        if frame_length > limits.max_frame_length {
            return Err(ProtocolError::FrameTooLarge {
                frame_length,
                max: limits.max_frame_length,
            });
        }

        let commitment = match version {
            MessageVersion::V1 => None,
            MessageVersion::V2 => Some(reader.array::<COMMITMENT_LEN>()?),
        };

        let authenticated_len = reader.position();

        let header_iv = match version {
            MessageVersion::V1 => reader.take(suite.aead_iv_len)?.to_vec(),
            MessageVersion::V2 => Vec::new(),
        };
        let auth_tag = reader.take(suite.aead_tag_len)?.to_vec();

        debug_assert!(authenticated_len < reader.position());

        Ok(DecodedHeader {
            header: Self {
                suite,
                message_id,
                encryption_context,
                encrypted_data_keys,
                content_type,
                frame_length,
                header_iv,
                commitment,
                auth_tag,
            },
            authenticated_len,
            encoded_len: reader.position(),
        })
    }
}

fn check_frame_length(content_type: ContentType, frame_length: u32) -> Result<()> {
    let consistent = match content_type {
        ContentType::NonFramed => frame_length == 0,
        ContentType::Framed => frame_length > 0,
    };

    if consistent {
        Ok(())
    } else {
        Err(ProtocolError::InvalidFrameLength { content_type: content_type.name(), frame_length })
    }
}
