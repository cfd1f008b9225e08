//! HTTP listener.

use crate::error::Result;
use crate::routes::create_router;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use gateway_config::ServerSettings;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration from the `server` section.
    #[must_use]
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
        }
    }

    /// Set the host
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The gateway HTTP server
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind and serve until a shutdown signal arrives.
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound or fails while serving.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        let local = listener.local_addr()?;
        info!(address = %local, "Gateway listening");

        let router = create_router(self.state.with_local_address(local));
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            shutdown_signal().await;
        })
        .await?;

        info!("Gateway stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::new().with_host("127.0.0.1").with_port(9000);
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_config_from_settings() {
        let config = ServerConfig::from_settings(&ServerSettings::default());
        assert_eq!(config.bind_address(), "0.0.0.0:8090");
    }
}
