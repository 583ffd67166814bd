//! Bounds-checked primitives shared by every decoder and encoder.
//!
//! Every read checks the remaining input before touching it, so lengths and
//! counts from untrusted input can never cause an over-read or an allocation
//! larger than the input itself.

use bytes::BufMut;

use crate::errors::{ProtocolError, Result};

/// Cursor over untrusted input.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Bytes consumed so far.
    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `len` bytes.
    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if remaining < len {
            return Err(ProtocolError::Truncated { needed: len - remaining });
        }

        let start = self.position;
        self.position += len;

        // INVARIANT: start + len <= bytes.len() by the check above
        Ok(&self.bytes[start..self.position])
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    /// Read a `u16` length prefix followed by that many bytes.
    pub(crate) fn u16_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    /// Read a `u16`-prefixed UTF-8 string.
    pub(crate) fn u16_prefixed_str(&mut self, field: &'static str) -> Result<&'a str> {
        let bytes = self.u16_prefixed()?;
        std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8 { field })
    }
}

/// Write a `u16` length prefix followed by the bytes.
pub(crate) fn put_u16_prefixed(
    dst: &mut impl BufMut,
    field: &'static str,
    bytes: &[u8],
) -> Result<()> {
    let len = u16::try_from(bytes.len()).map_err(|_| ProtocolError::FieldTooLong {
        field,
        len: bytes.len(),
        max: u16::MAX as usize,
    })?;

    dst.put_u16(len);
    dst.put_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_integers() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut reader = Reader::new(&bytes);

        assert_eq!(reader.u8().unwrap(), 0x01);
        assert_eq!(reader.u16().unwrap(), 0x0203);
        assert_eq!(reader.u32().unwrap(), 0x0405_0607);
        assert!(reader.is_empty());
        assert_eq!(reader.position(), 7);
    }

    #[test]
    fn take_reports_missing_bytes() {
        let bytes = [0u8; 3];
        let mut reader = Reader::new(&bytes);

        assert_eq!(reader.take(10), Err(ProtocolError::Truncated { needed: 7 }));
        // Failed reads do not advance
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn huge_length_prefix_does_not_allocate() {
        let bytes = [0xFF, 0xFF, 0x00];
        let mut reader = Reader::new(&bytes);

        assert_eq!(reader.u16_prefixed(), Err(ProtocolError::Truncated { needed: 0xFFFF - 1 }));
    }

    #[test]
    fn prefixed_round_trip() {
        let mut buf = Vec::new();
        put_u16_prefixed(&mut buf, "field", b"hello").unwrap();

        let mut reader = Reader::new(&buf);
        assert_eq!(reader.u16_prefixed_str("field").unwrap(), "hello");
    }

    #[test]
    fn oversized_field_rejected() {
        let mut buf = Vec::new();
        let big = vec![0u8; u16::MAX as usize + 1];

        let result = put_u16_prefixed(&mut buf, "provider_info", &big);
        assert!(matches!(result, Err(ProtocolError::FieldTooLong { field: "provider_info", .. })));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let bytes = [0x00, 0x02, 0xC3, 0x28];
        let mut reader = Reader::new(&bytes);

        assert_eq!(
            reader.u16_prefixed_str("key"),
            Err(ProtocolError::InvalidUtf8 { field: "key" })
        );
    }
}
