//! Core error types.

/// Result alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors raised by the gateway collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The downstream service could not be reached or did not answer.
    #[error("Downstream invocation failed: {0}")]
    Downstream(String),

    /// The downstream request could not be built from the inbound request.
    #[error("Invalid downstream request: {0}")]
    InvalidRequest(String),
}

impl CoreError {
    /// Create a downstream error.
    pub fn downstream(msg: impl Into<String>) -> Self {
        Self::Downstream(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// HTTP status code the caller should observe for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Downstream(_) | Self::InvalidRequest(_) => 500,
        }
    }
}
