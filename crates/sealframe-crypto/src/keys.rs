//! Key material types.
//!
//! Every type here owns secret bytes and overwrites them on drop. `Debug`
//! implementations print lengths only, so keys cannot leak through logs or
//! error messages.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Length of a key commitment in committing suites.
pub const COMMITMENT_LEN: usize = 32;

/// Raw data key produced or unwrapped by a materials manager.
///
/// Ownership moves from the materials manager into the session, which hands
/// it to key derivation and drops it as soon as the content key exists.
pub struct DataKey {
    bytes: Vec<u8>,
}

impl DataKey {
    /// Take ownership of raw key bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Copy key bytes from a slice.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self { bytes: bytes.to_vec() }
    }

    /// Key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the key holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey").field("len", &self.bytes.len()).finish_non_exhaustive()
    }
}

/// Content-encryption key derived for exactly one message id.
pub struct ContentKey {
    bytes: Vec<u8>,
}

impl ContentKey {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the key holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentKey").field("len", &self.bytes.len()).finish_non_exhaustive()
    }
}

/// Key commitment binding a data key to a message id.
///
/// Not secret in the header, but derived from the data key, so it is treated
/// like key material until written out.
#[derive(Clone)]
pub struct Commitment {
    bytes: [u8; COMMITMENT_LEN],
}

impl Commitment {
    /// Wrap commitment bytes (e.g. as parsed from a header).
    pub fn from_bytes(bytes: [u8; COMMITMENT_LEN]) -> Self {
        Self { bytes }
    }

    /// Commitment bytes.
    pub fn as_bytes(&self) -> &[u8; COMMITMENT_LEN] {
        &self.bytes
    }

    /// Constant-time equality.
    pub fn ct_eq(&self, other: &Self) -> bool {
        self.bytes[..].ct_eq(&other.bytes[..]).into()
    }
}

impl Drop for Commitment {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Commitment(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_key_bytes() {
        let key = DataKey::new(vec![0xAB; 32]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("len: 32"));
        assert!(!rendered.to_lowercase().contains("ab, ab"));
        assert!(!rendered.contains("171"));
    }

    #[test]
    fn commitment_equality() {
        let a = Commitment::from_bytes([1; COMMITMENT_LEN]);
        let b = Commitment::from_bytes([1; COMMITMENT_LEN]);
        let mut c_bytes = [1; COMMITMENT_LEN];
        c_bytes[31] = 2;
        let c = Commitment::from_bytes(c_bytes);

        assert!(a.ct_eq(&b));
        assert!(!a.ct_eq(&c));
    }

    #[test]
    fn data_key_accessors() {
        let key = DataKey::from_slice(&[7u8; 16]);
        assert_eq!(key.len(), 16);
        assert!(!key.is_empty());
        assert_eq!(key.as_bytes(), &[7u8; 16]);
    }
}
