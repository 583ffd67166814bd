//! Encrypted data keys carried in the header.

use std::fmt;

use bytes::{BufMut, Bytes};

use crate::{
    codec::{Reader, put_u16_prefixed},
    errors::{ProtocolError, Result},
};

/// A data key wrapped by one master key provider.
///
/// The engine never interprets `provider_info` or `ciphertext`; they are
/// opaque to everything except the materials manager that produced them.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedDataKey {
    /// Identifies the provider able to unwrap this key
    pub provider_id: String,
    /// Provider-specific key identifier
    pub provider_info: Bytes,
    /// Wrapped data key
    pub ciphertext: Bytes,
}

impl EncryptedDataKey {
    /// Create an encrypted data key.
    pub fn new(
        provider_id: impl Into<String>,
        provider_info: impl Into<Bytes>,
        ciphertext: impl Into<Bytes>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            provider_info: provider_info.into(),
            ciphertext: ciphertext.into(),
        }
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        6 + self.provider_id.len() + self.provider_info.len() + self.ciphertext.len()
    }

    pub(crate) fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        put_u16_prefixed(dst, "provider id", self.provider_id.as_bytes())?;
        put_u16_prefixed(dst, "provider info", &self.provider_info)?;
        put_u16_prefixed(dst, "encrypted data key", &self.ciphertext)
    }

    pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let provider_id = reader.u16_prefixed_str("provider id")?.to_owned();
        let provider_info = Bytes::copy_from_slice(reader.u16_prefixed()?);
        let ciphertext = Bytes::copy_from_slice(reader.u16_prefixed()?);

        Ok(Self { provider_id, provider_info, ciphertext })
    }
}

// Ciphertext is not secret, but it is large and useless in logs
impl fmt::Debug for EncryptedDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedDataKey")
            .field("provider_id", &self.provider_id)
            .field("provider_info_len", &self.provider_info.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// Write the EDK section: `u16 count` followed by each key.
pub(crate) fn encode_edks(edks: &[EncryptedDataKey], dst: &mut impl BufMut) -> Result<()> {
    if edks.is_empty() {
        return Err(ProtocolError::NoEncryptedDataKeys);
    }

    let count = u16::try_from(edks.len()).map_err(|_| ProtocolError::TooManyEncryptedDataKeys {
        count: edks.len(),
        max: u16::MAX as usize,
    })?;

    dst.put_u16(count);
    for edk in edks {
        edk.encode(dst)?;
    }

    Ok(())
}

/// Read the EDK section.
///
/// The count is checked against `max` before any key is read, so an
/// adversarial count costs nothing.
pub(crate) fn decode_edks(
    reader: &mut Reader<'_>,
    max: Option<usize>,
) -> Result<Vec<EncryptedDataKey>> {
    let count = reader.u16()? as usize;
    if count == 0 {
        return Err(ProtocolError::NoEncryptedDataKeys);
    }

    if let Some(max) = max
        && count > max
    {
        return Err(ProtocolError::TooManyEncryptedDataKeys { count, max });
    }

    // Each key is at least 6 bytes, so this cannot exceed the input size
    let mut edks = Vec::with_capacity(count.min(reader.remaining() / 6));
    for _ in 0..count {
        edks.push(EncryptedDataKey::decode(reader)?);
    }

    Ok(edks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedDataKey {
        EncryptedDataKey::new("static-provider", &b"key-1"[..], vec![0xAB; 48])
    }

    #[test]
    fn edk_roundtrip() {
        let edk = sample();
        let mut buf = Vec::new();
        edk.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), edk.encoded_len());

        let mut reader = Reader::new(&buf);
        assert_eq!(EncryptedDataKey::decode(&mut reader).unwrap(), edk);
        assert!(reader.is_empty());
    }

    #[test]
    fn empty_list_rejected_both_ways() {
        let mut buf = Vec::new();
        assert_eq!(encode_edks(&[], &mut buf), Err(ProtocolError::NoEncryptedDataKeys));

        let bytes = [0x00, 0x00];
        let mut reader = Reader::new(&bytes);
        assert_eq!(decode_edks(&mut reader, None), Err(ProtocolError::NoEncryptedDataKeys));
    }

    #[test]
    fn count_limit_checked_before_parsing() {
        // Claims 3 keys but carries none
        let bytes = [0x00, 0x03];
        let mut reader = Reader::new(&bytes);

        assert_eq!(
            decode_edks(&mut reader, Some(2)),
            Err(ProtocolError::TooManyEncryptedDataKeys { count: 3, max: 2 })
        );
    }

    #[test]
    fn huge_count_is_truncation_not_allocation() {
        let bytes = [0xFF, 0xFF, 0x00, 0x00];
        let mut reader = Reader::new(&bytes);

        assert!(decode_edks(&mut reader, None).unwrap_err().is_incomplete());
    }

    #[test]
    fn debug_hides_ciphertext() {
        let rendered = format!("{:?}", sample());
        assert!(rendered.contains("ciphertext_len: 48"));
        assert!(!rendered.contains("171"));
    }
}
