use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::TypeError;

/// Length in bytes of a content digest.
pub const DIGEST_LEN: usize = 32;

/// Content-addressed identity of a stored payload.
///
/// A `Digest` is the SHA-256 hash of a payload's exact bytes. Identical
/// content always produces the same `Digest`, which is what lets many file
/// names share a single stored blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Compute the digest of a payload.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Wrap a pre-computed hash.
    pub const fn from_hash(hash: [u8; DIGEST_LEN]) -> Self {
        Self(hash)
    }

    /// Decode a digest from raw bytes as stored by a storage engine.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: DIGEST_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters), for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Returns `true` if `data` hashes to this digest.
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_sha256_vector() {
        // sha256("abc")
        let digest = Digest::of(b"abc");
        assert_eq!(
            digest.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn different_data_produces_different_digests() {
        assert_ne!(Digest::of(b"hello"), Digest::of(b"world"));
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Digest::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn from_hex_rejects_non_hex() {
        assert!(matches!(
            Digest::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn from_hex_tolerates_surrounding_whitespace() {
        let digest = Digest::of(b"padded");
        let parsed = Digest::from_hex(&format!(" {}\n", digest.to_hex())).unwrap();
        assert_eq!(parsed, digest);
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(Digest::from_slice(&[0u8; 31]).is_err());
        assert_eq!(Digest::from_slice(&[7u8; 32]).unwrap(), Digest::from_hash([7u8; 32]));
    }

    #[test]
    fn display_is_full_hex() {
        let digest = Digest::of(b"test");
        let display = format!("{digest}");
        assert_eq!(display.len(), 64);
        assert_eq!(display, digest.to_hex());
        assert_eq!(digest.short_hex().len(), 8);
    }

    #[test]
    fn matches_detects_tampering() {
        let digest = Digest::of(b"original");
        assert!(digest.matches(b"original"));
        assert!(!digest.matches(b"tampered"));
    }

    proptest! {
        #[test]
        fn digest_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(Digest::of(&data), Digest::of(&data.clone()));
        }

        #[test]
        fn hex_parses_back(bytes in any::<[u8; 32]>()) {
            let digest = Digest::from_hash(bytes);
            prop_assert_eq!(digest.to_hex().parse::<Digest>().unwrap(), digest);
        }
    }
}
