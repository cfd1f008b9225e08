//! Security error types.

/// Result type for security operations.
pub type Result<T> = std::result::Result<T, SecurityError>;

/// Security error type.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// Source address refused by the whitelist.
    #[error(transparent)]
    Gate(#[from] GateRejection),

    /// Signed-request authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthRejection),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal security error: {0}")]
    Internal(String),
}

impl SecurityError {
    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if error is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Gate(_) | Self::Auth(_))
    }

    /// Get HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Gate(_) | Self::Auth(_) => 403,
            Self::Config(_) | Self::Internal(_) => 500,
        }
    }
}

/// The whitelist refused a source address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Source address not whitelisted: {address}")]
pub struct GateRejection {
    /// The refused host.
    pub address: String,
}

impl GateRejection {
    /// Create a rejection for `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Stable machine-readable reason code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        "not_whitelisted"
    }

    /// Wire status for a whitelist rejection.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        403
    }
}

/// Why a signed request was refused.
///
/// All variants are reported to the caller as the same `403`; the variant is
/// kept for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthRejection {
    /// `accessKey` missing, empty, or not provisioned.
    #[error("unknown access key")]
    UnknownKey,

    /// `nonce` missing, not a non-negative integer, or above the ceiling.
    #[error("invalid nonce")]
    InvalidNonce,

    /// `timestamp` missing, unparseable, too old, or too far in the future.
    #[error("stale timestamp")]
    StaleTimestamp,

    /// `sign` missing or not equal to the recomputed signature.
    #[error("signature mismatch")]
    SignatureMismatch,
}

impl AuthRejection {
    /// Stable machine-readable reason code.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::UnknownKey => "unknown_key",
            Self::InvalidNonce => "invalid_nonce",
            Self::StaleTimestamp => "stale_timestamp",
            Self::SignatureMismatch => "signature_mismatch",
        }
    }

    /// Wire status for every authentication rejection.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        403
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SecurityError::from(GateRejection::new("10.0.0.2"));
        assert!(err.to_string().contains("10.0.0.2"));

        let err = SecurityError::from(AuthRejection::StaleTimestamp);
        assert_eq!(err.to_string(), "stale timestamp");
    }

    #[test]
    fn test_is_client_error() {
        assert!(SecurityError::from(AuthRejection::UnknownKey).is_client_error());
        assert!(SecurityError::from(GateRejection::new("x")).is_client_error());
        assert!(!SecurityError::internal("boom").is_client_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(SecurityError::from(GateRejection::new("x")).status_code(), 403);
        assert_eq!(SecurityError::from(AuthRejection::InvalidNonce).status_code(), 403);
        assert_eq!(SecurityError::config("bad").status_code(), 500);
        assert_eq!(SecurityError::internal("bad").status_code(), 500);
    }

    #[test]
    fn test_reasons_are_distinct() {
        let reasons = [
            AuthRejection::UnknownKey,
            AuthRejection::InvalidNonce,
            AuthRejection::StaleTimestamp,
            AuthRejection::SignatureMismatch,
        ]
        .map(AuthRejection::reason);

        for (i, a) in reasons.iter().enumerate() {
            for b in &reasons[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(AuthRejection::SignatureMismatch.status_code(), 403);
        assert_eq!(GateRejection::new("x").reason(), "not_whitelisted");
    }
}
