//! # Gateway Telemetry
//!
//! Structured logging and optional OpenTelemetry tracing for the ingress gateway.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing, TracingConfig, TracingError};
