//! End-to-end fuzz target for the encrypt/decrypt sessions
//!
//! Seals an arbitrary plaintext with a fixed data key, applies arbitrary
//! mutations to the ciphertext, and decrypts it in arbitrary chunks.
//!
//! # Invariants
//!
//! - Neither session panics
//! - An unmodified message always decrypts to the original plaintext,
//!   however it is chunked
//! - A modified message never decrypts successfully

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealframe_core::{
    CommitmentPolicy, Decryptor, EncryptRequest, EncryptionMaterials, Encryptor, Environment,
    SessionAction, SessionConfig, SessionError,
};
use sealframe_crypto::{AlgorithmSuite, DataKey, all_suites};
use sealframe_proto::{EncryptedDataKey, EncryptionContext};

const DATA_KEY: [u8; 32] = [0x5a; 32];

#[derive(Clone)]
struct FuzzEnv(u8);

impl Environment for FuzzEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.0.wrapping_add(i as u8);
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u8,
    suite_index: u8,
    frame_length: u8,
    chunk: u8,
    plaintext: Vec<u8>,
    mutations: Vec<Mutation>,
}

#[derive(Debug, Arbitrary)]
enum Mutation {
    FlipBit { index: u16, bit: u8 },
    Truncate { len: u16 },
    Append { bytes: Vec<u8> },
}

fn seal(input: &Input, suite: &AlgorithmSuite, config: &SessionConfig) -> Option<Vec<u8>> {
    let mut context = EncryptionContext::new();
    context.insert("fuzz".to_owned(), "pipeline".to_owned());
    let request = EncryptRequest::new(context).with_suite(suite.id);

    let mut session = Encryptor::new(request, config, &FuzzEnv(input.seed)).ok()?;
    session.start().ok()?;

    let mut out = Vec::new();
    let materials = EncryptionMaterials {
        data_key: DataKey::from_slice(&DATA_KEY[..suite.data_key_len]),
        encrypted_data_keys: vec![EncryptedDataKey::new("fuzz", &b""[..], vec![0; 8])],
    };
    for step in [
        session.provide_materials(materials),
        session.update(&input.plaintext),
        session.finish(),
    ] {
        for action in step.ok()? {
            if let SessionAction::Output(bytes) = action {
                out.extend_from_slice(&bytes);
            }
        }
    }
    Some(out)
}

fn open(config: &SessionConfig, ciphertext: &[u8], chunk: usize) -> Result<Vec<u8>, SessionError> {
    let mut session = Decryptor::new(config)?;
    let mut out = Vec::new();

    for piece in ciphertext.chunks(chunk) {
        let mut pending = session.update(piece)?;
        while !pending.is_empty() {
            let mut next = Vec::new();
            for action in pending {
                match action {
                    SessionAction::RequestDataKey(request) => {
                        let key = DataKey::from_slice(&DATA_KEY[..request.suite().data_key_len]);
                        next.extend(session.provide_data_key(key)?);
                    },
                    SessionAction::Output(bytes) => out.extend_from_slice(&bytes),
                    SessionAction::Complete => {},
                }
            }
            pending = next;
        }
    }

    session.finish()?;
    Ok(out)
}

fuzz_target!(|input: Input| {
    let suites = all_suites();
    let suite = &suites[input.suite_index as usize % suites.len()];
    let commitment_policy = if suite.is_committing() {
        CommitmentPolicy::RequireEncryptRequireDecrypt
    } else {
        CommitmentPolicy::ForbidEncryptAllowDecrypt
    };

    let config = SessionConfig {
        frame_length: u32::from(input.frame_length),
        commitment_policy,
        ..Default::default()
    };
    let Some(original) = seal(&input, suite, &config) else {
        return;
    };

    let mut ciphertext = original.clone();
    for mutation in &input.mutations {
        match mutation {
            Mutation::FlipBit { index, bit } => {
                if !ciphertext.is_empty() {
                    let index = *index as usize % ciphertext.len();
                    ciphertext[index] ^= 1 << (bit % 8);
                }
            },
            Mutation::Truncate { len } => ciphertext.truncate(*len as usize),
            Mutation::Append { bytes } => ciphertext.extend_from_slice(bytes),
        }
    }

    let chunk = usize::from(input.chunk).max(1);
    let result = open(&config, &ciphertext, chunk);

    if ciphertext == original {
        assert_eq!(result.ok().as_deref(), Some(input.plaintext.as_slice()));
    } else {
        assert!(result.is_err(), "modified message accepted");
    }
});
