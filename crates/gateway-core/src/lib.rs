//! # Gateway Core
//!
//! Core types and collaborator traits for the ingress gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - The per-request view ([`RequestContext`]) and the signed-request headers ([`AuthHeaders`])
//! - Credential lookup ([`CredentialStore`]) and time ([`Clock`]) collaborators
//! - The downstream invocation seam ([`Downstream`]) and the chunked body model
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod credentials;
pub mod downstream;
pub mod error;
pub mod request;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use credentials::{Credential, CredentialStore, StaticCredentialStore};
pub use downstream::{BoxError, ChunkStream, Downstream, DownstreamBody, DownstreamResponse};
pub use error::{CoreError, CoreResult};
pub use request::{AuthHeaders, RequestContext, RequestId};
