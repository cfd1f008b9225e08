//! Hashing primitives.

use crate::error::{Result, SecurityError};
use hmac::digest::{CtOutput, Output};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// HMAC-SHA256 type.
type HmacSha256 = Hmac<Sha256>;

/// Stateless hashing helpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashingService;

impl HashingService {
    /// Hash data using SHA-256.
    #[must_use]
    pub fn sha256(data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }

    /// Hash data using SHA-256 and return hex.
    #[must_use]
    pub fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Self::sha256(data))
    }

    /// Generate HMAC-SHA256.
    ///
    /// # Errors
    /// Returns error if HMAC generation fails.
    pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| SecurityError::internal(format!("Invalid HMAC key: {e}")))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Generate HMAC-SHA256 and return hex.
    ///
    /// # Errors
    /// Returns error if HMAC generation fails.
    pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> Result<String> {
        Self::hmac_sha256(key, data).map(hex::encode)
    }

    /// Check an HMAC-SHA256 tag in constant time.
    ///
    /// Tags of the wrong length are rejected.
    #[must_use]
    pub fn verify_hmac_sha256(key: &[u8], data: &[u8], tag: &[u8]) -> bool {
        let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key) else {
            return false;
        };
        mac.update(data);
        mac.verify_slice(tag).is_ok()
    }

    /// Compare two SHA-256 digests in constant time.
    ///
    /// Either side not being 32 bytes long compares unequal.
    #[must_use]
    pub fn sha256_digest_eq(a: &[u8], b: &[u8]) -> bool {
        const LEN: usize = 32;
        if a.len() != LEN || b.len() != LEN {
            return false;
        }
        let a = CtOutput::<Sha256>::new(Output::<Sha256>::clone_from_slice(a));
        let b = CtOutput::<Sha256>::new(Output::<Sha256>::clone_from_slice(b));
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            HashingService::sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hmac_sha256_hex() {
        // RFC 4231 test case 2.
        let mac =
            HashingService::hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            mac,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_accepts_empty_key() {
        assert!(HashingService::hmac_sha256_hex(b"", b"payload").is_ok());
    }

    #[test]
    fn test_verify_hmac_sha256() {
        let tag = HashingService::hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap();

        assert!(HashingService::verify_hmac_sha256(
            b"Jefe",
            b"what do ya want for nothing?",
            &tag
        ));
        assert!(!HashingService::verify_hmac_sha256(b"Jefe", b"what do ya want?", &tag));
        assert!(!HashingService::verify_hmac_sha256(
            b"Jefe",
            b"what do ya want for nothing?",
            &tag[..16]
        ));
    }

    #[test]
    fn test_sha256_digest_eq() {
        let a = HashingService::sha256(b"hello");
        let b = HashingService::sha256(b"world");

        assert!(HashingService::sha256_digest_eq(&a, &HashingService::sha256(b"hello")));
        assert!(!HashingService::sha256_digest_eq(&a, &b));
        assert!(!HashingService::sha256_digest_eq(&a, &a[..31]));
        assert!(!HashingService::sha256_digest_eq(b"", b""));
    }
}
