//! Trailing message signatures (Ed25519ph)
//!
//! The signer and verifier keep a running SHA-512 digest over every byte of
//! the header and body as they are produced or consumed. The digest is signed
//! once, after the final frame, and appended as the message trailer.

use std::fmt;

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use crate::{AlgorithmSuite, CryptoError, Result};

/// Length of an Ed25519 signing key seed.
pub const SIGNING_SEED_LEN: usize = 32;

/// Length of an encoded Ed25519 verifying key.
pub const VERIFYING_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519ph context string binding signatures to this message format
const TRAILER_CONTEXT: &[u8] = b"sealframe-trailer";

/// Running signer over an outgoing message.
pub struct TrailerSigner {
    key: SigningKey,
    digest: Sha512,
}

impl TrailerSigner {
    /// Create a signer from a caller-provided random seed.
    ///
    /// The seed is zeroized after the key is expanded.
    ///
    /// # Errors
    ///
    /// - `NotSigningSuite` if the suite has no trailing signature
    pub fn new(suite: &AlgorithmSuite, mut seed: [u8; SIGNING_SEED_LEN]) -> Result<Self> {
        if !suite.is_signed() {
            seed.zeroize();
            return Err(CryptoError::NotSigningSuite { id: suite.id });
        }

        let key = SigningKey::from_bytes(&seed);
        seed.zeroize();

        Ok(Self { key, digest: Sha512::new() })
    }

    /// Encoded public key to publish in the encryption context.
    pub fn verifying_key(&self) -> [u8; VERIFYING_KEY_LEN] {
        self.key.verifying_key().to_bytes()
    }

    /// Feed bytes that will appear in the message.
    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Sign everything fed so far.
    pub fn finalize(self) -> [u8; SIGNATURE_LEN] {
        let Ok(signature) = self.key.sign_prehashed(self.digest, Some(TRAILER_CONTEXT)) else {
            unreachable!("context string is shorter than the Ed25519ph limit");
        };
        signature.to_bytes()
    }
}

/// Running verifier over an incoming message.
pub struct TrailerVerifier {
    key: VerifyingKey,
    digest: Sha512,
}

impl TrailerVerifier {
    /// Create a verifier from an encoded public key.
    ///
    /// # Errors
    ///
    /// - `InvalidVerificationKey` if the bytes are not a valid key
    pub fn new(key_bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; VERIFYING_KEY_LEN] =
            key_bytes.try_into().map_err(|_| CryptoError::InvalidVerificationKey)?;
        let key =
            VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidVerificationKey)?;

        Ok(Self { key, digest: Sha512::new() })
    }

    /// Feed bytes read from the message.
    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Verify the trailer signature over everything fed so far.
    ///
    /// # Errors
    ///
    /// - `SignatureInvalid` if the signature is malformed or does not verify
    pub fn verify(self, signature: &[u8]) -> Result<()> {
        let signature =
            Signature::from_slice(signature).map_err(|_| CryptoError::SignatureInvalid)?;

        self.key
            .verify_prehashed(self.digest, Some(TRAILER_CONTEXT), &signature)
            .map_err(|_| CryptoError::SignatureInvalid)
    }
}

impl fmt::Debug for TrailerSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrailerSigner").finish_non_exhaustive()
    }
}

impl fmt::Debug for TrailerVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrailerVerifier").field("key", &self.key).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::lookup;

    fn signing_suite() -> &'static AlgorithmSuite {
        lookup(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY_ED25519).unwrap()
    }

    #[test]
    fn sign_verify_roundtrip() {
        let mut signer = TrailerSigner::new(signing_suite(), [0x11; SIGNING_SEED_LEN]).unwrap();
        signer.update(b"header");
        signer.update(b"body");
        let public = signer.verifying_key();
        let signature = signer.finalize();

        let mut verifier = TrailerVerifier::new(&public).unwrap();
        verifier.update(b"headerbody");
        assert!(verifier.verify(&signature).is_ok());
    }

    #[test]
    fn modified_message_fails() {
        let mut signer = TrailerSigner::new(signing_suite(), [0x22; SIGNING_SEED_LEN]).unwrap();
        signer.update(b"message");
        let public = signer.verifying_key();
        let signature = signer.finalize();

        let mut verifier = TrailerVerifier::new(&public).unwrap();
        verifier.update(b"messagf");
        assert_eq!(verifier.verify(&signature), Err(CryptoError::SignatureInvalid));
    }

    #[test]
    fn flipped_signature_bit_fails() {
        let mut signer = TrailerSigner::new(signing_suite(), [0x33; SIGNING_SEED_LEN]).unwrap();
        signer.update(b"message");
        let public = signer.verifying_key();
        let mut signature = signer.finalize();
        signature[10] ^= 0x04;

        let mut verifier = TrailerVerifier::new(&public).unwrap();
        verifier.update(b"message");
        assert_eq!(verifier.verify(&signature), Err(CryptoError::SignatureInvalid));
    }

    #[test]
    fn short_signature_fails() {
        let verifier = TrailerVerifier::new(
            &TrailerSigner::new(signing_suite(), [1; SIGNING_SEED_LEN]).unwrap().verifying_key(),
        )
        .unwrap();
        assert_eq!(verifier.verify(&[0u8; 63]), Err(CryptoError::SignatureInvalid));
    }

    #[test]
    fn non_signing_suite_rejected() {
        let suite = lookup(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY).unwrap();
        let result = TrailerSigner::new(suite, [0; SIGNING_SEED_LEN]);
        assert!(matches!(result, Err(CryptoError::NotSigningSuite { id: 0x0478 })));
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(matches!(
            TrailerVerifier::new(&[0u8; 31]),
            Err(CryptoError::InvalidVerificationKey)
        ));
    }

    #[test]
    fn same_seed_same_public_key() {
        let a = TrailerSigner::new(signing_suite(), [9; SIGNING_SEED_LEN]).unwrap();
        let b = TrailerSigner::new(signing_suite(), [9; SIGNING_SEED_LEN]).unwrap();
        assert_eq!(a.verifying_key(), b.verifying_key());
    }
}
