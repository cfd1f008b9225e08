//! Server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gateway_core::CoreError;
use gateway_security::SecurityError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error type.
///
/// Rendered to callers as a bare status code: the gateway never explains a
/// refusal on the wire.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Refused by the whitelist or the authenticator.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// The downstream service failed or produced an unusable response.
    #[error("Upstream invocation failed: {0}")]
    UpstreamInvocation(String),

    /// A collaborator reported an error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The server could not be configured.
    #[error("Invalid server configuration: {0}")]
    Config(String),

    /// Listener I/O failure.
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create an upstream invocation error.
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamInvocation(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            Self::Security(e) => e.status_code(),
            Self::Core(e) => e.status_code(),
            Self::UpstreamInvocation(_) | Self::Config(_) | Self::Io(_) => 500,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}

/// A response log sink could not record an event.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Response log sink failed: {0}")]
pub struct SinkError(pub String);
