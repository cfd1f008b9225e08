//! Shared application state.

use crate::filter::GatewayFilter;
use gateway_security::TrustedProxies;
use std::net::SocketAddr;
use std::sync::Arc;

/// State shared by every request handler.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The ingress pipeline.
    pub filter: GatewayFilter,
    /// Proxies whose `X-Forwarded-For` is honored.
    pub trusted_proxies: Arc<TrustedProxies>,
    /// Address the listener is bound to.
    pub local_address: Option<SocketAddr>,
}

impl AppState {
    /// State that trusts no proxy.
    #[must_use]
    pub fn new(filter: GatewayFilter) -> Self {
        Self {
            filter,
            trusted_proxies: Arc::new(TrustedProxies::new()),
            local_address: None,
        }
    }

    /// Set the trusted proxies.
    #[must_use]
    pub fn with_trusted_proxies(mut self, proxies: TrustedProxies) -> Self {
        self.trusted_proxies = Arc::new(proxies);
        self
    }

    /// Record the bound listener address.
    #[must_use]
    pub fn with_local_address(mut self, addr: SocketAddr) -> Self {
        self.local_address = Some(addr);
        self
    }
}
