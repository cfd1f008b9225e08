//! Request signing and verification.
//!
//! A signature is a deterministic keyed hash over the canonical payload carried
//! in the `body` header, rendered as lowercase hex. Clients and the gateway must
//! agree on the algorithm byte for byte.

use crate::crypto::HashingService;
use crate::error::{Result, SecurityError};
use gateway_core::AuthHeaders;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC-SHA256 keyed with the secret.
    #[default]
    #[serde(rename = "HMAC-SHA256")]
    HmacSha256,
    /// SHA-256 over `payload + "." + secret`, as produced by the legacy client SDK.
    #[serde(rename = "SHA256-DIGEST")]
    Sha256Digest,
}

impl SigningAlgorithm {
    /// Compute the signature of `payload` under `secret`.
    ///
    /// # Errors
    /// Returns error if the keyed hash cannot be initialized.
    pub fn sign(self, payload: &str, secret: &str) -> Result<String> {
        match self {
            Self::HmacSha256 => {
                HashingService::hmac_sha256_hex(secret.as_bytes(), payload.as_bytes())
            }
            Self::Sha256Digest => {
                let content = format!("{payload}.{secret}");
                Ok(HashingService::sha256_hex(content.as_bytes()))
            }
        }
    }
}

impl std::fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HmacSha256 => write!(f, "HMAC-SHA256"),
            Self::Sha256Digest => write!(f, "SHA256-DIGEST"),
        }
    }
}

impl std::str::FromStr for SigningAlgorithm {
    type Err = SecurityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HMAC-SHA256" => Ok(Self::HmacSha256),
            "SHA256-DIGEST" => Ok(Self::Sha256Digest),
            _ => Err(SecurityError::config(format!("Unknown signing algorithm: {s}"))),
        }
    }
}

/// Client-side signer producing the five authentication headers.
#[derive(Clone)]
pub struct RequestSigner {
    access_key: String,
    secret: SecretString,
    algorithm: SigningAlgorithm,
}

impl RequestSigner {
    /// Create a signer for one credential.
    pub fn new(access_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret: SecretString::new(secret.into()),
            algorithm: SigningAlgorithm::default(),
        }
    }

    /// Set the signing algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sign a bare payload.
    ///
    /// # Errors
    /// Returns error if signing fails.
    pub fn sign_message(&self, payload: &str) -> Result<String> {
        self.algorithm.sign(payload, self.secret.expose_secret())
    }

    /// Produce a complete header set for `payload`.
    ///
    /// # Errors
    /// Returns error if signing fails.
    pub fn sign_request(&self, nonce: u64, timestamp: i64, payload: &str) -> Result<AuthHeaders> {
        Ok(AuthHeaders {
            access_key: Some(self.access_key.clone()),
            nonce: Some(nonce.to_string()),
            body: Some(payload.to_string()),
            timestamp: Some(timestamp.to_string()),
            sign: Some(self.sign_message(payload)?),
        })
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .field("secret", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Gateway-side signature check.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier {
    algorithm: SigningAlgorithm,
}

impl SignatureVerifier {
    /// Create a verifier for `algorithm`.
    #[must_use]
    pub const fn new(algorithm: SigningAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The algorithm in use.
    #[must_use]
    pub const fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Whether `supplied` is the signature of `payload` under `secret`.
    ///
    /// `supplied` is hex in either case. The tag comparison is constant time.
    #[must_use]
    pub fn verify(&self, payload: &str, secret: &str, supplied: &str) -> bool {
        let Ok(supplied) = hex::decode(supplied.trim()) else {
            return false;
        };
        match self.algorithm {
            SigningAlgorithm::HmacSha256 => {
                let (key, data) = (secret.as_bytes(), payload.as_bytes());
                HashingService::verify_hmac_sha256(key, data, &supplied)
            }
            SigningAlgorithm::Sha256Digest => {
                let expected = HashingService::sha256(format!("{payload}.{secret}").as_bytes());
                HashingService::sha256_digest_eq(&expected, &supplied)
            }
        }
    }
}
