//! Property tests for the session state machines.
//!
//! Sessions are driven directly, without a runtime: the key request is
//! answered inline with a fixed data key. These check that:
//! - Input split at arbitrary points decrypts to the same plaintext
//! - Any single flipped bit makes decryption fail and never yields plaintext
//!   that differs from the original
//! - Frame sizes follow the configured frame length

use proptest::prelude::*;
use sealframe_core::{
    Decryptor, EncryptRequest, EncryptionMaterials, Encryptor, Environment, ErrorKind,
    SessionAction, SessionConfig, SessionError, SessionState,
};
use sealframe_crypto::{AlgorithmSuite, DataKey, SuiteId};
use sealframe_proto::{EncryptedDataKey, EncryptionContext};

#[derive(Clone)]
struct FixedEnv(u8);

impl Environment for FixedEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.0 ^ (i as u8);
        }
    }
}

const DATA_KEY: [u8; 32] = [0x42; 32];

fn signed_committing() -> SuiteId {
    AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY_ED25519
}

fn seal(config: &SessionConfig, plaintext: &[u8], seed: u8) -> Vec<u8> {
    let mut context = EncryptionContext::new();
    context.insert("purpose".to_owned(), "test".to_owned());

    let request = EncryptRequest::new(context).with_suite(signed_committing());
    let mut enc = Encryptor::new(request, config, &FixedEnv(seed)).expect("valid request");

    let mut out = Vec::new();
    let mut push = |actions: Vec<SessionAction>| {
        for action in actions {
            if let SessionAction::Output(bytes) = action {
                out.extend_from_slice(&bytes);
            }
        }
    };

    enc.start().expect("start");
    push(
        enc.provide_materials(EncryptionMaterials {
            data_key: DataKey::from_slice(&DATA_KEY),
            encrypted_data_keys: vec![EncryptedDataKey::new("fixed", &b""[..], vec![0; 4])],
        })
        .expect("materials accepted"),
    );
    push(enc.update(plaintext).expect("update"));
    push(enc.finish().expect("finish"));
    assert_eq!(enc.state(), SessionState::Complete);
    out
}

/// Feed `chunks` to a fresh decryptor, answering the key request inline.
fn open_chunked<'a>(
    config: &SessionConfig,
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> Result<Vec<u8>, SessionError> {
    let mut dec = Decryptor::new(config)?;
    let mut out = Vec::new();

    for chunk in chunks {
        let mut pending = dec.update(chunk)?;
        while !pending.is_empty() {
            let mut next = Vec::new();
            for action in pending {
                match action {
                    SessionAction::RequestDataKey(_) => {
                        next.extend(dec.provide_data_key(DataKey::from_slice(&DATA_KEY))?);
                    },
                    SessionAction::Output(bytes) => out.extend_from_slice(&bytes),
                    SessionAction::Complete => {},
                }
            }
            pending = next;
        }
    }

    dec.finish()?;
    Ok(out)
}

#[test]
fn prop_split_points_do_not_matter() {
    proptest!(|(
        plaintext in prop::collection::vec(any::<u8>(), 0..600),
        frame_length in prop_oneof![Just(0u32), 1u32..128],
        chunk in 1usize..97,
        seed in any::<u8>(),
    )| {
        let config = SessionConfig { frame_length, ..Default::default() };
        let ciphertext = seal(&config, &plaintext, seed);

        let recovered = open_chunked(&config, ciphertext.chunks(chunk))
            .expect("decrypt should succeed");

        // PROPERTY: Chunking is invisible to the result
        prop_assert_eq!(recovered, plaintext);
    });
}

#[test]
fn prop_single_bit_flip_is_rejected() {
    proptest!(|(
        plaintext in prop::collection::vec(any::<u8>(), 1..200),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    )| {
        let config = SessionConfig { frame_length: 64, ..Default::default() };
        let mut ciphertext = seal(&config, &plaintext, 7);
        let index = position.index(ciphertext.len());
        ciphertext[index] ^= 1 << bit;

        // PROPERTY: Every byte of the message is authenticated
        let result = open_chunked(&config, [ciphertext.as_slice()]);
        prop_assert!(result.is_err(), "flip at {} accepted", index);

        let err = result.unwrap_err();
        prop_assert!(
            matches!(
                err.kind(),
                ErrorKind::BadCiphertext | ErrorKind::UnsupportedFormat | ErrorKind::Resource
            ),
            "unexpected kind {:?}",
            err.kind()
        );
    });
}

#[test]
fn prop_frames_follow_frame_length() {
    proptest!(|(len in 0usize..2000, frame_length in 1u32..300)| {
        let config = SessionConfig { frame_length, ..Default::default() };
        let request = EncryptRequest::default()
            .with_suite(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY);
        let mut enc = Encryptor::new(request, &config, &FixedEnv(1)).expect("valid request");
        enc.start().expect("start");
        enc.provide_materials(EncryptionMaterials {
            data_key: DataKey::from_slice(&DATA_KEY),
            encrypted_data_keys: vec![EncryptedDataKey::new("fixed", &b""[..], vec![0; 4])],
        })
        .expect("materials accepted");

        let mut frames = Vec::new();
        for action in enc.update(&vec![0u8; len]).expect("update") {
            if let SessionAction::Output(bytes) = action {
                frames.push(bytes.len());
            }
        }

        // PROPERTY: Regular frames are emitted only while more than one
        // frame of plaintext is buffered
        let frame_length = frame_length as usize;
        let expected_regular = len.saturating_sub(1) / frame_length;
        prop_assert_eq!(frames.len(), expected_regular);
        prop_assert!(frames.iter().all(|&n| n == 4 + 12 + frame_length + 16));

        let mut final_frame = None;
        for action in enc.finish().expect("finish") {
            if let SessionAction::Output(bytes) = action {
                final_frame = Some(bytes.len());
            }
        }
        let remainder = len - expected_regular * frame_length;
        prop_assert_eq!(final_frame, Some(4 + 4 + 12 + 4 + remainder + 16));
    });
}
