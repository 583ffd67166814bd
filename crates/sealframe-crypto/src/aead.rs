//! Detached AEAD over the suite's cipher
//!
//! All functions are pure. IVs are supplied by the caller: the message format
//! derives them from frame sequence numbers, so they are never random and never
//! repeat under one content key.

use aes_gcm::{
    Aes128Gcm, Aes256Gcm,
    aead::{AeadInPlace, KeyInit, generic_array::GenericArray},
};
use chacha20poly1305::ChaCha20Poly1305;

use crate::{AeadAlgorithm, AlgorithmSuite, CryptoError, Result, keys::ContentKey};

/// Encrypt `buffer` in place and return the authentication tag.
///
/// # Errors
///
/// - `InvalidKeyLength` / `InvalidIvLength` if the inputs do not match the
///   suite
pub fn seal_detached(
    suite: &AlgorithmSuite,
    key: &ContentKey,
    iv: &[u8],
    aad: &[u8],
    buffer: &mut [u8],
) -> Result<Vec<u8>> {
    check_lengths(suite, key, iv)?;
    let nonce = GenericArray::from_slice(iv);

    let sealed = match suite.aead {
        AeadAlgorithm::Aes128Gcm => cipher::<Aes128Gcm>(key)?
            .encrypt_in_place_detached(nonce, aad, buffer)
            .map(|tag| tag.to_vec()),
        AeadAlgorithm::Aes256Gcm => cipher::<Aes256Gcm>(key)?
            .encrypt_in_place_detached(nonce, aad, buffer)
            .map(|tag| tag.to_vec()),
        AeadAlgorithm::ChaCha20Poly1305 => cipher::<ChaCha20Poly1305>(key)?
            .encrypt_in_place_detached(nonce, aad, buffer)
            .map(|tag| tag.to_vec()),
    };

    let Ok(tag) = sealed else {
        unreachable!("AEAD encryption cannot fail with validated key and IV lengths");
    };

    Ok(tag)
}

/// Verify `tag` and decrypt `buffer` in place.
///
/// On failure the buffer contents are unspecified and must be discarded.
///
/// # Errors
///
/// - `AuthenticationFailed` if the tag does not verify
/// - `InvalidKeyLength` / `InvalidIvLength` if the inputs do not match the
///   suite
pub fn open_detached(
    suite: &AlgorithmSuite,
    key: &ContentKey,
    iv: &[u8],
    aad: &[u8],
    buffer: &mut [u8],
    tag: &[u8],
) -> Result<()> {
    check_lengths(suite, key, iv)?;
    if tag.len() != suite.aead_tag_len {
        return Err(CryptoError::AuthenticationFailed);
    }

    let nonce = GenericArray::from_slice(iv);
    let tag = GenericArray::from_slice(tag);

    let opened = match suite.aead {
        AeadAlgorithm::Aes128Gcm => {
            cipher::<Aes128Gcm>(key)?.decrypt_in_place_detached(nonce, aad, buffer, tag)
        },
        AeadAlgorithm::Aes256Gcm => {
            cipher::<Aes256Gcm>(key)?.decrypt_in_place_detached(nonce, aad, buffer, tag)
        },
        AeadAlgorithm::ChaCha20Poly1305 => {
            cipher::<ChaCha20Poly1305>(key)?.decrypt_in_place_detached(nonce, aad, buffer, tag)
        },
    };

    opened.map_err(|_| CryptoError::AuthenticationFailed)
}

fn cipher<C: KeyInit>(key: &ContentKey) -> Result<C> {
    C::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::InvalidKeyLength {
        expected: C::key_size(),
        actual: key.len(),
    })
}

fn check_lengths(suite: &AlgorithmSuite, key: &ContentKey, iv: &[u8]) -> Result<()> {
    if key.len() != suite.aead_key_len {
        return Err(CryptoError::InvalidKeyLength { expected: suite.aead_key_len, actual: key.len() });
    }

    if iv.len() != suite.aead_iv_len {
        return Err(CryptoError::InvalidIvLength { expected: suite.aead_iv_len, actual: iv.len() });
    }

    Ok(())
}
