//! Configuration loading: file, then environment overrides, then validation.

use crate::error::{ConfigError, ConfigResult};
use crate::settings::GatewayConfig;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

const HOST_ENV: &str = "GATEWAY_HOST";
const PORT_ENV: &str = "GATEWAY_PORT";
const UPSTREAM_ENV: &str = "GATEWAY_UPSTREAM_URL";
const LOG_LEVEL_ENV: &str = "GATEWAY_LOG_LEVEL";
const LOG_JSON_ENV: &str = "GATEWAY_LOG_JSON";

/// Load the process configuration.
///
/// Reads the file named by `GATEWAY_CONFIG` when set, otherwise starts from
/// defaults. `GATEWAY_*` overrides are applied last and the result is validated.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, an override is
/// malformed, or the final configuration is inconsistent.
pub async fn load_config() -> ConfigResult<GatewayConfig> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            info!(path = %path, "Loading configuration file");
            read_file(Path::new(&path)).await?
        }
        _ => {
            debug!("No configuration file set, using defaults");
            GatewayConfig::default()
        }
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a configuration file without environment overrides.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or is inconsistent.
pub async fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
    let config = read_file(path.as_ref()).await?;
    config.validate()?;
    Ok(config)
}

async fn read_file(path: &Path) -> ConfigResult<GatewayConfig> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    parse(&contents, &extension)
}

fn parse(contents: &str, extension: &str) -> ConfigResult<GatewayConfig> {
    match extension {
        "yaml" | "yml" => {
            serde_yaml::from_str(contents).map_err(|e| ConfigError::parse(e.to_string()))
        }
        "toml" => toml::from_str(contents).map_err(|e| ConfigError::parse(e.to_string())),
        "json" => serde_json::from_str(contents).map_err(|e| ConfigError::parse(e.to_string())),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Overlay `GATEWAY_*` variables resolved through `lookup`.
fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(HOST_ENV) {
        config.server.host = host;
    }

    if let Some(port) = lookup(PORT_ENV) {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            name: PORT_ENV.to_string(),
            message: format!("'{port}' is not a valid port"),
        })?;
    }

    if let Some(upstream) = lookup(UPSTREAM_ENV) {
        config.server.upstream_url = upstream;
    }

    if let Some(level) = lookup(LOG_LEVEL_ENV) {
        config.logging.level = level;
    }

    if let Some(json) = lookup(LOG_JSON_ENV) {
        config.logging.json = match json.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => {
                return Err(ConfigError::InvalidEnv {
                    name: LOG_JSON_ENV.to_string(),
                    message: format!("'{json}' is not a boolean"),
                })
            }
        };
    }

    Ok(())
}
