//! Content key derivation using HKDF

use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};

use crate::{
    AlgorithmSuite, CryptoError, KdfHash, MessageVersion, Result,
    keys::{COMMITMENT_LEN, Commitment, ContentKey, DataKey},
};

/// Info label for the content key in committing suites
const DERIVE_KEY_LABEL: &[u8] = b"DERIVEKEY";

/// Info label for the key commitment in committing suites
const COMMIT_KEY_LABEL: &[u8] = b"COMMITKEY";

/// Output of [`derive_content_key`].
#[derive(Debug)]
pub struct DerivedKeys {
    /// Key for the header tag and all body frames
    pub content_key: ContentKey,
    /// Key commitment, present only for committing suites
    pub commitment: Option<Commitment>,
}

/// Derive the content key (and commitment) for one message.
///
/// - Suites without a KDF use the data key bytes as the content key.
/// - Version 1 suites run HKDF with no salt and `suite_id || message_id` as
///   info.
/// - Committing suites extract with the message id as salt, then expand twice
///   with distinct labels, so key and commitment are independent outputs of
///   the same secret.
///
/// All length checks happen before any output buffer is allocated.
///
/// # Errors
///
/// - `InvalidMessageIdLength` if `message_id` does not match the suite format
/// - `InvalidKeyLength` if `data_key` does not match the suite's key length
pub fn derive_content_key(
    suite: &AlgorithmSuite,
    data_key: &DataKey,
    message_id: &[u8],
) -> Result<DerivedKeys> {
    if message_id.len() != suite.message_id_len() {
        return Err(CryptoError::InvalidMessageIdLength {
            expected: suite.message_id_len(),
            actual: message_id.len(),
        });
    }

    if data_key.len() != suite.data_key_len {
        return Err(CryptoError::InvalidKeyLength {
            expected: suite.data_key_len,
            actual: data_key.len(),
        });
    }

    let suite_id = suite.id.to_be_bytes();

    match (suite.kdf, suite.message_version) {
        (KdfHash::None, _) => Ok(DerivedKeys {
            content_key: ContentKey::new(data_key.as_bytes()[..suite.aead_key_len].to_vec()),
            commitment: None,
        }),
        (kdf, MessageVersion::V1) => {
            let mut key = vec![0u8; suite.aead_key_len];
            hkdf_expand(kdf, None, data_key.as_bytes(), &[&suite_id, message_id], &mut key);
            Ok(DerivedKeys { content_key: ContentKey::new(key), commitment: None })
        },
        (kdf, MessageVersion::V2) => {
            let mut key = vec![0u8; suite.aead_key_len];
            hkdf_expand(
                kdf,
                Some(message_id),
                data_key.as_bytes(),
                &[&suite_id, DERIVE_KEY_LABEL],
                &mut key,
            );

            let mut commitment = [0u8; COMMITMENT_LEN];
            hkdf_expand(
                kdf,
                Some(message_id),
                data_key.as_bytes(),
                &[COMMIT_KEY_LABEL],
                &mut commitment,
            );

            let commitment = Commitment::from_bytes(commitment);
            Ok(DerivedKeys { content_key: ContentKey::new(key), commitment: Some(commitment) })
        },
    }
}

/// Compare a derived commitment with the one read from a header.
///
/// # Errors
///
/// - `CommitmentMismatch` if the values differ (constant time)
pub fn verify_commitment(derived: &Commitment, stored: &Commitment) -> Result<()> {
    if derived.ct_eq(stored) { Ok(()) } else { Err(CryptoError::CommitmentMismatch) }
}

/// HKDF extract-and-expand with the suite's hash.
fn hkdf_expand(kdf: KdfHash, salt: Option<&[u8]>, ikm: &[u8], info: &[&[u8]], okm: &mut [u8]) {
    let expanded = match kdf {
        KdfHash::Sha256 => Hkdf::<Sha256>::new(salt, ikm).expand_multi_info(info, okm),
        KdfHash::Sha384 => Hkdf::<Sha384>::new(salt, ikm).expand_multi_info(info, okm),
        KdfHash::Sha512 => Hkdf::<Sha512>::new(salt, ikm).expand_multi_info(info, okm),
        KdfHash::None => unreachable!("suites without a KDF never reach HKDF"),
    };

    let Ok(()) = expanded else {
        unreachable!("key and commitment lengths are valid HKDF output lengths");
    };
}
