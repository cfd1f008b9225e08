//! # Ingress Gateway
//!
//! Signed-request ingress gate placed in front of an upstream HTTP service.
//!
//! Every request is checked against an address whitelist and a signed-header
//! authentication scheme before it is forwarded. Successful responses stream
//! back unchanged while their body is captured for the log.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (listen on 0.0.0.0:8090, forward to 127.0.0.1:8123)
//! ingress-gateway
//!
//! # Start with a config file
//! GATEWAY_CONFIG=/etc/gateway/config.yaml ingress-gateway
//!
//! # Start with environment overrides
//! GATEWAY_PORT=9000 GATEWAY_UPSTREAM_URL=http://10.0.0.7:8080 ingress-gateway
//! ```

use anyhow::Context;
use gateway_config::{load_config, GatewayConfig};
use gateway_core::SystemClock;
use gateway_security::{credentials_from_settings, RequestAuthenticator, TrustedProxies, Whitelist};
use gateway_server::{
    AppState, GatewayFilter, HttpForwarder, ResponseInterceptor, Server, ServerConfig,
};
use gateway_telemetry::{init_tracing, shutdown_tracing, TracingConfig};
use std::sync::Arc;
use tracing::{error, info};

/// Application entry point
#[tokio::main]
async fn main() {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    let provider = match init_tracing(&TracingConfig::from_settings(&config.logging)) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            None
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting ingress gateway"
    );

    let result = run(config).await;
    if let Err(e) = &result {
        error!(error = ?e, "Gateway failed");
    }

    shutdown_tracing(provider);
    if result.is_err() {
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        host = %config.server.host,
        port = config.server.port,
        upstream = %config.server.upstream_url,
        "Configuration loaded"
    );

    let whitelist = Whitelist::from_settings(&config.whitelist).context("whitelist")?;
    let proxies = TrustedProxies::from_entries(&config.whitelist.trusted_proxies)
        .context("whitelist.trusted_proxies")?;
    info!(
        entries = whitelist.len(),
        trusted_proxies = config.whitelist.trusted_proxies.len(),
        "Whitelist loaded"
    );

    let credentials = credentials_from_settings(&config.auth);
    info!(credentials = credentials.len(), "Credential store ready");

    let authenticator = RequestAuthenticator::from_settings(
        &config.auth,
        Arc::new(credentials),
        Arc::new(SystemClock),
    )
    .context("auth")?;

    let forwarder = HttpForwarder::from_settings(&config.server).context("server.upstream_url")?;
    let interceptor =
        ResponseInterceptor::from_settings(&config.interceptor).context("interceptor")?;

    let filter = GatewayFilter::new(whitelist, authenticator, Arc::new(forwarder), interceptor);
    let state = AppState::new(filter.clone()).with_trusted_proxies(proxies);

    let server = Server::new(ServerConfig::from_settings(&config.server), state);
    server.run().await?;

    let stats = filter.stats().snapshot();
    info!(
        received = stats.received,
        forbidden = stats.forbidden,
        invoked = stats.invoked,
        upstream_failures = stats.upstream_failures,
        "Final request counters"
    );

    Ok(())
}
