//! Property-based tests for the message format codec
//!
//! These verify that headers, frames and bodies survive encoding for all
//! valid inputs, and that decoding arbitrary or truncated bytes fails cleanly
//! instead of panicking or over-reading.

use bytes::Bytes;
use proptest::prelude::*;
use sealframe_crypto::{AlgorithmSuite, COMMITMENT_LEN, all_suites};
use sealframe_proto::{
    ContentType, DecodeLimits, EncryptedDataKey, EncryptionContext, Frame, MessageHeader,
    NonFramedBody, ProtocolError, frame_iv,
};

/// Strategy for picking a registered suite
fn arbitrary_suite() -> impl Strategy<Value = &'static AlgorithmSuite> {
    (0..all_suites().len()).prop_map(|i| &all_suites()[i])
}

/// Strategy for small encryption contexts with printable keys and values
fn arbitrary_context() -> impl Strategy<Value = EncryptionContext> {
    prop::collection::btree_map("[a-z0-9-]{1,12}", "[ -~]{0,24}", 0..6)
}

fn arbitrary_edk() -> impl Strategy<Value = EncryptedDataKey> {
    (
        "[a-z-]{1,16}",
        prop::collection::vec(any::<u8>(), 0..32),
        prop::collection::vec(any::<u8>(), 1..64),
    )
        .prop_map(|(id, info, ct)| EncryptedDataKey::new(id, info, ct))
}

/// Strategy for complete headers (commitment and tag filled with random bytes)
fn arbitrary_header() -> impl Strategy<Value = MessageHeader> {
    (
        arbitrary_suite(),
        arbitrary_context(),
        prop::collection::vec(arbitrary_edk(), 1..4),
        prop_oneof![Just(0u32), 1u32..=65_536],
        any::<[u8; 32]>(),
        any::<u8>(),
    )
        .prop_map(|(suite, context, edks, frame_length, id_bytes, fill)| {
            let content_type =
                if frame_length == 0 { ContentType::NonFramed } else { ContentType::Framed };
            let message_id = id_bytes[..suite.message_id_len()].to_vec();

            let mut header =
                MessageHeader::new(suite, message_id, context, edks, content_type, frame_length)
                    .expect("generated header is valid");
            if suite.is_committing() {
                header.commitment = Some([fill; COMMITMENT_LEN]);
            }
            header.auth_tag = vec![fill ^ 0xFF; suite.aead_tag_len];
            header
        })
}

#[test]
fn prop_header_roundtrip() {
    proptest!(|(header in arbitrary_header())| {
        let bytes = header.to_bytes().expect("encode should succeed");

        let decoded = MessageHeader::decode(&bytes, &DecodeLimits::default())
            .expect("decode should succeed");

        // PROPERTY: Round-trip is identity and consumes the whole header
        prop_assert_eq!(&decoded.header, &header);
        prop_assert_eq!(decoded.encoded_len, bytes.len());
        prop_assert_eq!(
            &bytes[..decoded.authenticated_len],
            &header.authenticated_bytes().expect("encode should succeed")[..]
        );
    });
}

#[test]
fn prop_header_prefix_is_incomplete() {
    proptest!(|(header in arbitrary_header(), cut in any::<prop::sample::Index>())| {
        let bytes = header.to_bytes().expect("encode should succeed");
        let len = cut.index(bytes.len());

        let err = MessageHeader::decode(&bytes[..len], &DecodeLimits::default())
            .expect_err("prefix cannot decode");

        // PROPERTY: A strict prefix always asks for more input
        prop_assert!(err.is_incomplete(), "prefix {} of {}: {:?}", len, bytes.len(), err);
    });
}

#[test]
fn prop_header_trailing_bytes_ignored() {
    proptest!(|(header in arbitrary_header(), extra in prop::collection::vec(any::<u8>(), 0..64))| {
        let mut bytes = header.to_bytes().expect("encode should succeed");
        let header_len = bytes.len();
        bytes.extend_from_slice(&extra);

        let decoded = MessageHeader::decode(&bytes, &DecodeLimits::default())
            .expect("decode should succeed");

        // PROPERTY: The decoder reports exactly the header's own length
        prop_assert_eq!(decoded.encoded_len, header_len);
    });
}

#[test]
fn prop_header_decode_arbitrary_bytes_never_panics() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..512))| {
        let _ = MessageHeader::decode(&bytes, &DecodeLimits::default());
    });
}

#[test]
fn prop_frame_sequence_roundtrip() {
    proptest!(|(
        suite in arbitrary_suite(),
        frame_length in 1u32..2048,
        count in 1usize..6,
        final_len in any::<prop::sample::Index>(),
    )| {
        // A body of `count` regular frames and a final frame
        let final_len = final_len.index(frame_length as usize + 1);
        let mut frames = Vec::new();
        for seq in 1..=count as u32 {
            frames.push(Frame {
                sequence_number: seq,
                is_final: false,
                iv: Bytes::from(frame_iv(suite, seq)),
                ciphertext: Bytes::from(vec![seq as u8; frame_length as usize]),
                tag: Bytes::from(vec![0xAB; suite.aead_tag_len]),
            });
        }
        let last = count as u32 + 1;
        frames.push(Frame {
            sequence_number: last,
            is_final: true,
            iv: Bytes::from(frame_iv(suite, last)),
            ciphertext: Bytes::from(vec![0xCD; final_len]),
            tag: Bytes::from(vec![0xEF; suite.aead_tag_len]),
        });

        let mut body = Vec::new();
        for frame in &frames {
            frame.encode(frame_length, &mut body).expect("encode should succeed");
        }

        // PROPERTY: Decoding consecutive frames yields the same sequence
        let mut offset = 0;
        for expected in &frames {
            let (frame, used) = Frame::decode(&body[offset..], suite, frame_length)
                .expect("decode should succeed");
            prop_assert_eq!(&frame, expected);
            offset += used;
        }
        prop_assert_eq!(offset, body.len());
    });
}

#[test]
fn prop_short_regular_frame_rejected() {
    proptest!(|(frame_length in 2u32..1024, short_by in 1u32..1024)| {
        let short_by = short_by.min(frame_length - 1);
        let suite = &all_suites()[0];
        let frame = Frame {
            sequence_number: 1,
            is_final: false,
            iv: Bytes::from(frame_iv(suite, 1)),
            ciphertext: Bytes::from(vec![0u8; (frame_length - short_by) as usize]),
            tag: Bytes::from(vec![0u8; suite.aead_tag_len]),
        };

        let mut buf = Vec::new();
        let result = frame.encode(frame_length, &mut buf);

        // PROPERTY: Regular frames are exactly frame_length bytes
        let is_length_error = matches!(result, Err(ProtocolError::FrameContentLength { .. }));
        prop_assert!(is_length_error);
    });
}

#[test]
fn prop_non_framed_roundtrip() {
    proptest!(|(suite in arbitrary_suite(), content in prop::collection::vec(any::<u8>(), 0..4096))| {
        let body = NonFramedBody {
            iv: Bytes::from(frame_iv(suite, 1)),
            ciphertext: Bytes::from(content),
            tag: Bytes::from(vec![0x11; suite.aead_tag_len]),
        };

        let mut buf = Vec::new();
        body.encode(&mut buf).expect("encode should succeed");
        let (decoded, used) = NonFramedBody::decode(&buf, suite, u64::MAX)
            .expect("decode should succeed");

        prop_assert_eq!(decoded, body);
        prop_assert_eq!(used, buf.len());
    });
}

#[test]
fn prop_frame_decode_arbitrary_bytes_never_panics() {
    proptest!(|(
        suite in arbitrary_suite(),
        frame_length in 1u32..=u32::MAX,
        bytes in prop::collection::vec(any::<u8>(), 0..256),
    )| {
        // Huge declared lengths must surface as truncation, never allocation
        let _ = Frame::decode(&bytes, suite, frame_length);
        let _ = NonFramedBody::decode(&bytes, suite, u64::MAX);
    });
}
