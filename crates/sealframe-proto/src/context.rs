//! Encryption context serialization.
//!
//! The context is a set of UTF-8 key/value pairs bound to the message as
//! header AAD. On the wire it is written in one canonical form only:
//!
//! ```text
//! u16 aad_len
//! (if aad_len > 0)
//!   u16 count
//!   count x (u16 key_len, key, u16 value_len, value)
//! ```
//!
//! Entries are sorted by the byte order of their keys. An empty context is a
//! bare `aad_len = 0`. Decoding rejects every other form so that one context
//! has exactly one encoding and therefore one header tag.

use std::collections::BTreeMap;

use bytes::BufMut;

use crate::{
    codec::{Reader, put_u16_prefixed},
    errors::{ProtocolError, Result},
};

/// Key/value pairs authenticated with the message.
///
/// `BTreeMap<String, String>` iterates in the byte order of its keys, which is
/// the canonical wire order.
pub type EncryptionContext = BTreeMap<String, String>;

/// Number of bytes [`encode_context`] writes for `context`.
pub fn encoded_context_len(context: &EncryptionContext) -> usize {
    2 + entries_len(context)
}

fn entries_len(context: &EncryptionContext) -> usize {
    if context.is_empty() {
        return 0;
    }

    2 + context.iter().map(|(k, v)| 2 + k.len() + 2 + v.len()).sum::<usize>()
}

/// Write the context section of a header.
///
/// # Errors
///
/// - `FieldTooLong` if a key, a value, the entry count or the whole section
///   does not fit its `u16` length field
pub fn encode_context(context: &EncryptionContext, dst: &mut impl BufMut) -> Result<()> {
    let section_len = entries_len(context);
    let aad_len = u16::try_from(section_len).map_err(|_| ProtocolError::FieldTooLong {
        field: "encryption context",
        len: section_len,
        max: u16::MAX as usize,
    })?;

    dst.put_u16(aad_len);
    if context.is_empty() {
        return Ok(());
    }

    // INVARIANT: count <= section_len / 4 < u16::MAX once section_len fits
    #[allow(clippy::expect_used)]
    let count = u16::try_from(context.len()).expect("invariant: entry count bounded by aad_len");
    dst.put_u16(count);

    for (key, value) in context {
        put_u16_prefixed(dst, "context key", key.as_bytes())?;
        put_u16_prefixed(dst, "context value", value.as_bytes())?;
    }

    Ok(())
}

/// Read the context section of a header.
///
/// # Errors
///
/// - `Truncated` if the section extends past the input
/// - `NonCanonicalContext` for unsorted or duplicate keys, or a non-empty
///   section declaring zero entries
/// - `ContextLengthMismatch` if the entries do not exactly fill `aad_len`
/// - `InvalidUtf8` for non UTF-8 keys or values
pub(crate) fn decode_context(reader: &mut Reader<'_>) -> Result<EncryptionContext> {
    let aad_len = reader.u16()? as usize;
    let mut context = EncryptionContext::new();
    if aad_len == 0 {
        return Ok(context);
    }

    // Bound the section up front so a bogus count cannot read into the EDKs
    let mut section = Reader::new(reader.take(aad_len)?);
    let count = section.u16()?;
    if count == 0 {
        return Err(ProtocolError::NonCanonicalContext);
    }

    for _ in 0..count {
        let key = section.u16_prefixed_str("context key").map_err(|e| overrun(e, aad_len))?;
        let value = section.u16_prefixed_str("context value").map_err(|e| overrun(e, aad_len))?;

        if let Some((last, _)) = context.last_key_value()
            && last.as_bytes() >= key.as_bytes()
        {
            return Err(ProtocolError::NonCanonicalContext);
        }

        context.insert(key.to_owned(), value.to_owned());
    }

    if !section.is_empty() {
        return Err(ProtocolError::ContextLengthMismatch {
            declared: aad_len,
            actual: section.position(),
        });
    }

    Ok(context)
}

/// Entries claiming more bytes than `aad_len` are a length mismatch, not a
/// request for more input.
fn overrun(err: ProtocolError, declared: usize) -> ProtocolError {
    match err {
        ProtocolError::Truncated { needed } => {
            ProtocolError::ContextLengthMismatch { declared, actual: declared + needed }
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> EncryptionContext {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    fn encode(ctx: &EncryptionContext) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_context(ctx, &mut buf).unwrap();
        buf
    }

    #[test]
    fn empty_context_is_two_zero_bytes() {
        let encoded = encode(&EncryptionContext::new());
        assert_eq!(encoded, [0x00, 0x00]);
        assert_eq!(encoded_context_len(&EncryptionContext::new()), 2);
    }

    #[test]
    fn known_encoding() {
        let encoded = encode(&context(&[("purpose", "test")]));

        // aad_len 17, count 1, "purpose" (7), "test" (4)
        let expected = hex::decode("001100010007707572706f7365000474657374").unwrap();
        assert_eq!(encoded, expected);
        assert_eq!(encoded.len(), encoded_context_len(&context(&[("purpose", "test")])));
    }

    #[test]
    fn roundtrip_is_sorted() {
        let ctx = context(&[("zeta", "1"), ("alpha", "2"), ("mid", "")]);
        let encoded = encode(&ctx);

        let mut reader = Reader::new(&encoded);
        let decoded = decode_context(&mut reader).unwrap();

        assert_eq!(decoded, ctx);
        assert!(reader.is_empty());
        assert_eq!(decoded.keys().next().map(String::as_str), Some("alpha"));
    }

    #[test]
    fn unsorted_entries_rejected() {
        // count 2: "b"="", "a"=""
        let bytes = [0, 12, 0, 2, 0, 1, b'b', 0, 0, 0, 1, b'a', 0, 0];
        let mut reader = Reader::new(&bytes);

        assert_eq!(decode_context(&mut reader), Err(ProtocolError::NonCanonicalContext));
    }

    #[test]
    fn duplicate_keys_rejected() {
        let bytes = [0, 12, 0, 2, 0, 1, b'a', 0, 0, 0, 1, b'a', 0, 0];
        let mut reader = Reader::new(&bytes);

        assert_eq!(decode_context(&mut reader), Err(ProtocolError::NonCanonicalContext));
    }

    #[test]
    fn zero_count_with_nonzero_length_rejected() {
        let bytes = [0x00, 0x02, 0x00, 0x00];
        let mut reader = Reader::new(&bytes);

        assert_eq!(decode_context(&mut reader), Err(ProtocolError::NonCanonicalContext));
    }

    #[test]
    fn slack_bytes_rejected() {
        let mut bytes = encode(&context(&[("k", "v")]));
        bytes[1] += 1;
        bytes.push(0);
        let mut reader = Reader::new(&bytes);

        assert!(matches!(
            decode_context(&mut reader),
            Err(ProtocolError::ContextLengthMismatch { .. })
        ));
    }

    #[test]
    fn entries_overrunning_section_rejected() {
        let mut bytes = encode(&context(&[("key", "value")]));
        bytes[1] -= 1;
        let mut reader = Reader::new(&bytes);

        assert!(matches!(
            decode_context(&mut reader),
            Err(ProtocolError::ContextLengthMismatch { .. })
        ));
    }

    #[test]
    fn truncated_section_needs_more_input() {
        let bytes = encode(&context(&[("key", "value")]));
        let mut reader = Reader::new(&bytes[..bytes.len() - 2]);

        assert!(decode_context(&mut reader).unwrap_err().is_incomplete());
    }

    #[test]
    fn oversized_context_rejected() {
        let ctx = context(&[("big", &"x".repeat(u16::MAX as usize))]);
        let mut buf = Vec::new();

        assert!(matches!(
            encode_context(&ctx, &mut buf),
            Err(ProtocolError::FieldTooLong { .. })
        ));
    }
}
