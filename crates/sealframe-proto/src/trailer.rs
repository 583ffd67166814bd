//! Signature trailer: `u16 signature_len | signature`.

use bytes::{BufMut, Bytes};
use sealframe_crypto::SIGNATURE_LEN;

use crate::{
    codec::{Reader, put_u16_prefixed},
    errors::{ProtocolError, Result},
};

/// Trailing signature of a signed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// Signature over the header and body
    pub signature: Bytes,
}

impl Trailer {
    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        2 + self.signature.len()
    }

    /// Encode the trailer.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        put_u16_prefixed(dst, "signature", &self.signature)
    }

    /// Decode a trailer from the start of `bytes`.
    ///
    /// Only signatures of the registered signature length are accepted.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut reader = Reader::new(bytes);

        let len = reader.u16()? as usize;
        if len != SIGNATURE_LEN {
            return Err(ProtocolError::InvalidSignatureLength(len));
        }

        let signature = Bytes::copy_from_slice(reader.take(len)?);
        Ok((Self { signature }, reader.position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_roundtrip() {
        let trailer = Trailer { signature: Bytes::from(vec![0x5C; SIGNATURE_LEN]) };
        let mut buf = Vec::new();
        trailer.encode(&mut buf).unwrap();
        assert_eq!(&buf[..2], &[0x00, 0x40]);

        let (decoded, used) = Trailer::decode(&buf).unwrap();
        assert_eq!(decoded, trailer);
        assert_eq!(used, trailer.encoded_len());
    }

    #[test]
    fn wrong_length_rejected() {
        assert_eq!(
            Trailer::decode(&[0x00, 0x20, 0x01]),
            Err(ProtocolError::InvalidSignatureLength(32))
        );
    }

    #[test]
    fn partial_signature_needs_more_input() {
        let mut buf = vec![0x00, 0x40];
        buf.extend_from_slice(&[0u8; 10]);

        assert!(Trailer::decode(&buf).unwrap_err().is_incomplete());
    }
}
