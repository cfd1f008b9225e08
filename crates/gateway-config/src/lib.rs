//! # Gateway Config
//!
//! Process-wide configuration for the ingress gateway.
//!
//! Configuration is loaded once at startup from an optional YAML, TOML or JSON
//! file, overlaid with `GATEWAY_*` environment variables, validated, and then
//! shared read-only for the lifetime of the process.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_from_path, CONFIG_PATH_ENV};
pub use settings::{
    AuthSettings, CredentialSettings, GatewayConfig, InterceptorSettings, LoggingSettings,
    ServerSettings, WhitelistSettings,
};
