//! # Gateway Security
//!
//! The two gates every inbound request passes before it is forwarded.
//!
//! ## Features
//!
//! - **Whitelist**: source address admission by IP, CIDR network or host name
//! - **Signed requests**: access key, nonce bound, timestamp freshness and
//!   keyed-hash signature checks, in that order
//! - **Replay policy**: pluggable nonce check behind [`ReplayPolicy`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gateway_core::{StaticCredentialStore, SystemClock};
//! use gateway_security::{RequestAuthenticator, Whitelist};
//!
//! let whitelist = Whitelist::from_entries(["127.0.0.1"]).unwrap();
//! let authenticator = RequestAuthenticator::new(
//!     Arc::new(StaticCredentialStore::placeholder()),
//!     Arc::new(SystemClock),
//! );
//! assert!(whitelist.admit("127.0.0.1"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authenticator;
pub mod crypto;
pub mod error;
pub mod replay;
pub mod signing;
pub mod whitelist;

pub use authenticator::{credentials_from_settings, Principal, RequestAuthenticator};
pub use crypto::HashingService;
pub use error::{AuthRejection, GateRejection, Result, SecurityError};
pub use replay::{NonceCeiling, ReplayPolicy, ReplayWindow};
pub use signing::{RequestSigner, SignatureVerifier, SigningAlgorithm};
pub use whitelist::{TrustedProxies, Whitelist};
