//! Configuration model.

use crate::error::{ConfigError, ConfigResult};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// Listener and upstream settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Source address whitelist.
    #[serde(default)]
    pub whitelist: WhitelistSettings,

    /// Signed-request authentication.
    #[serde(default)]
    pub auth: AuthSettings,

    /// Response interception.
    #[serde(default)]
    pub interceptor: InterceptorSettings,

    /// Logging and tracing.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl GatewayConfig {
    /// Check cross-field consistency.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.whitelist.validate()?;
        self.auth.validate()?;
        self.interceptor.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Listener and upstream settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL admitted requests are forwarded to.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Timeout for the downstream call to produce a response head.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:8123".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream_url: default_upstream_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ServerSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::validation("server.host must not be empty"));
        }

        let upstream = url::Url::parse(&self.upstream_url).map_err(|e| {
            ConfigError::validation(format!(
                "server.upstream_url '{}' is not a valid URL: {e}",
                self.upstream_url
            ))
        })?;

        if !matches!(upstream.scheme(), "http" | "https") {
            return Err(ConfigError::validation(format!(
                "server.upstream_url must use http or https, got '{}'",
                upstream.scheme()
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::validation(
                "server.request_timeout must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Source address whitelist.
#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistSettings {
    /// Allowed source hosts: IP addresses, CIDR networks or host names.
    #[serde(default = "default_allowed")]
    pub allowed: Vec<String>,

    /// Proxies whose `X-Forwarded-For` header is trusted to name the client.
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

fn default_allowed() -> Vec<String> {
    vec!["127.0.0.1".to_string()]
}

impl Default for WhitelistSettings {
    fn default() -> Self {
        Self {
            allowed: default_allowed(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl WhitelistSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.allowed.is_empty() {
            return Err(ConfigError::validation(
                "whitelist.allowed must list at least one host",
            ));
        }

        if self.allowed.iter().any(|entry| entry.trim().is_empty()) {
            return Err(ConfigError::validation(
                "whitelist.allowed contains an empty entry",
            ));
        }

        Ok(())
    }
}

/// Signed-request authentication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Largest accepted nonce value.
    #[serde(default = "default_nonce_ceiling")]
    pub nonce_ceiling: u64,

    /// Maximum accepted age of a request timestamp (exclusive).
    #[serde(default = "default_timestamp_tolerance", with = "humantime_serde")]
    pub timestamp_tolerance: Duration,

    /// How far in the future a timestamp may lie.
    #[serde(default = "default_clock_skew", with = "humantime_serde")]
    pub clock_skew: Duration,

    /// Signing algorithm name (`HMAC-SHA256` or `SHA256-DIGEST`).
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Provisioned credentials. Empty means the placeholder credential.
    #[serde(default)]
    pub credentials: Vec<CredentialSettings>,
}

fn default_nonce_ceiling() -> u64 {
    1000
}

fn default_timestamp_tolerance() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_clock_skew() -> Duration {
    Duration::from_secs(60)
}

fn default_algorithm() -> String {
    "HMAC-SHA256".to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            nonce_ceiling: default_nonce_ceiling(),
            timestamp_tolerance: default_timestamp_tolerance(),
            clock_skew: default_clock_skew(),
            algorithm: default_algorithm(),
            credentials: Vec::new(),
        }
    }
}

impl AuthSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.timestamp_tolerance.as_secs() == 0 {
            return Err(ConfigError::validation(
                "auth.timestamp_tolerance must be at least one second",
            ));
        }

        if let Some(empty) = self
            .credentials
            .iter()
            .find(|c| c.access_key.trim().is_empty())
        {
            return Err(ConfigError::validation(format!(
                "auth.credentials contains an entry with an empty access_key: {empty:?}"
            )));
        }

        Ok(())
    }
}

/// One provisioned credential.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSettings {
    /// Public access key.
    pub access_key: String,
    /// Shared secret.
    pub secret_key: SecretString,
}

/// Response interception settings.
#[derive(Debug, Clone, Deserialize)]
pub struct InterceptorSettings {
    /// Status that switches the interceptor from pass-through to capture.
    #[serde(default = "default_success_status")]
    pub success_status: u16,

    /// Upper bound on the body bytes kept for the response log.
    #[serde(default = "default_capture_limit")]
    pub capture_limit_bytes: usize,

    /// Emit one debug line per forwarded chunk.
    #[serde(default = "default_true")]
    pub log_chunks: bool,
}

fn default_success_status() -> u16 {
    200
}

fn default_capture_limit() -> usize {
    64 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for InterceptorSettings {
    fn default() -> Self {
        Self {
            success_status: default_success_status(),
            capture_limit_bytes: default_capture_limit(),
            log_chunks: true,
        }
    }
}

impl InterceptorSettings {
    fn validate(&self) -> ConfigResult<()> {
        if !(100..=599).contains(&self.success_status) {
            return Err(ConfigError::validation(format!(
                "interceptor.success_status must be between 100 and 599, got {}",
                self.success_status
            )));
        }
        Ok(())
    }
}

/// Logging and tracing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,

    /// Attach an OpenTelemetry layer.
    #[serde(default)]
    pub otel_enabled: bool,

    /// Service name reported in traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Deployment environment reported in traces.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Fraction of traces sampled by the OpenTelemetry layer, 0.0 to 1.0.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "ingress-gateway".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_sampling_rate() -> f64 {
    1.0
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            otel_enabled: false,
            service_name: default_service_name(),
            environment: default_environment(),
            sampling_rate: default_sampling_rate(),
        }
    }
}

impl LoggingSettings {
    fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(ConfigError::validation(format!(
                "logging.sampling_rate must be between 0.0 and 1.0, got {}",
                self.sampling_rate
            )));
        }
        Ok(())
    }
}
