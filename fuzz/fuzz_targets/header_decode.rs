//! Fuzz target for MessageHeader::decode
//!
//! Feeds arbitrary bytes to the header parser to find:
//! - Parser crashes or panics
//! - Length fields that read past the input
//! - Offsets that disagree with each other
//!
//! The parser should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealframe_proto::{DecodeLimits, MessageHeader};

fuzz_target!(|data: &[u8]| {
    let limits = DecodeLimits { max_encrypted_data_keys: Some(16), max_frame_length: 1 << 20 };

    if let Ok(decoded) = MessageHeader::decode(data, &limits) {
        assert!(decoded.encoded_len <= data.len(), "header longer than input");
        assert!(decoded.authenticated_len <= decoded.encoded_len);
        assert!(!decoded.header.encrypted_data_keys.is_empty());
        assert_eq!(decoded.header.message_id.len(), decoded.header.suite.message_id_len());
    }
});
