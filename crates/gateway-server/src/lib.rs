//! # Gateway Server
//!
//! HTTP surface of the ingress gateway.
//!
//! This crate provides:
//! - the ingress filter (whitelist, authentication, downstream call, interception)
//! - the streaming response interceptor
//! - the reqwest-based upstream forwarder
//! - the axum listener with graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod filter;
pub mod forwarder;
pub mod interceptor;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use error::{Result, ServerError, SinkError};
pub use filter::{FilterState, FilterStats, FilterStatsSnapshot, GatewayFilter};
pub use forwarder::HttpForwarder;
pub use interceptor::{
    InterceptedResponse, ResponseInterceptor, ResponseLogSink, StreamOutcome, TracingLogSink,
    DEFAULT_CAPTURE_LIMIT,
};
pub use routes::{create_router, REQUEST_ID_HEADER};
pub use server::{Server, ServerConfig};
pub use shutdown::shutdown_signal;
pub use state::AppState;
