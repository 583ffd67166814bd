//! Fuzz target for body and trailer decoding
//!
//! # Strategy
//!
//! - Suite: every registered suite, chosen by index
//! - Frame length: zero, one, small, at the decode limit, random
//! - Body: arbitrary bytes, parsed as a frame, a non-framed block and a
//!   trailer
//!
//! # Invariants
//!
//! - Decoding never panics
//! - Consumed length never exceeds the input
//! - A decoded final frame never carries more than `frame_length` bytes

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealframe_crypto::all_suites;
use sealframe_proto::{Frame, NonFramedBody, Trailer};

#[derive(Debug, Arbitrary)]
struct Input {
    suite_index: u8,
    frame_length: FrameLength,
    max_body: u16,
    bytes: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
enum FrameLength {
    Zero,
    One,
    Small(u8),
    AtLimit,
    Random(u32),
}

impl FrameLength {
    fn value(&self) -> u32 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Small(n) => u32::from(*n),
            Self::AtLimit => 16 * 1024 * 1024,
            Self::Random(n) => *n,
        }
    }
}

fuzz_target!(|input: Input| {
    let suites = all_suites();
    let suite = &suites[input.suite_index as usize % suites.len()];
    let frame_length = input.frame_length.value();

    if let Ok((frame, used)) = Frame::decode(&input.bytes, suite, frame_length) {
        assert!(used <= input.bytes.len());
        assert_eq!(used, frame.encoded_len());
        if frame.is_final {
            assert!(frame.ciphertext.len() <= frame_length as usize);
        }
    }

    if let Ok((body, used)) = NonFramedBody::decode(&input.bytes, suite, u64::from(input.max_body))
    {
        assert!(used <= input.bytes.len());
        assert!(body.ciphertext.len() <= input.max_body as usize);
    }

    if let Ok((_, used)) = Trailer::decode(&input.bytes) {
        assert!(used <= input.bytes.len());
    }
});
