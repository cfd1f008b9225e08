//! Replay-window policy: nonce and timestamp freshness.
//!
//! The shipped [`NonceCeiling`] only bounds the nonce value; it does not
//! remember nonces it has seen. A policy that does must keep per-key state
//! behind its own synchronization and can be swapped in through [`ReplayPolicy`].

use crate::error::AuthRejection;
use gateway_config::AuthSettings;
use std::time::Duration;

/// Process-wide replay constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayWindow {
    /// Largest accepted nonce.
    pub nonce_ceiling: u64,
    /// A timestamp this old or older is stale.
    pub timestamp_tolerance: Duration,
    /// How far ahead of the gateway clock a timestamp may be.
    pub clock_skew: Duration,
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self {
            nonce_ceiling: 1000,
            timestamp_tolerance: Duration::from_secs(5 * 60),
            clock_skew: Duration::from_secs(60),
        }
    }
}

impl ReplayWindow {
    /// Window described by the `auth` configuration section.
    #[must_use]
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            nonce_ceiling: settings.nonce_ceiling,
            timestamp_tolerance: settings.timestamp_tolerance,
            clock_skew: settings.clock_skew,
        }
    }

    /// Check a raw `timestamp` header against `now` (Unix seconds).
    ///
    /// # Errors
    /// [`AuthRejection::StaleTimestamp`] if missing, unparseable, at least
    /// `timestamp_tolerance` old, or more than `clock_skew` in the future.
    pub fn check_timestamp(&self, timestamp: Option<&str>, now: i64) -> Result<(), AuthRejection> {
        let ts: i64 = timestamp
            .and_then(|raw| raw.trim().parse().ok())
            .ok_or(AuthRejection::StaleTimestamp)?;

        let tolerance = i64::try_from(self.timestamp_tolerance.as_secs()).unwrap_or(i64::MAX);
        let skew = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);

        let age = now.saturating_sub(ts);
        if age >= tolerance || age < -skew {
            return Err(AuthRejection::StaleTimestamp);
        }

        Ok(())
    }
}

/// Decides whether a nonce is acceptable for an access key.
pub trait ReplayPolicy: Send + Sync {
    /// Check the raw `nonce` header sent with `access_key`.
    ///
    /// # Errors
    /// [`AuthRejection::InvalidNonce`] when the nonce must be refused.
    fn check_nonce(&self, access_key: &str, nonce: Option<&str>) -> Result<(), AuthRejection>;
}

/// Accepts any non-negative integer nonce up to a fixed ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceCeiling {
    ceiling: u64,
}

impl NonceCeiling {
    /// Accept nonces in `0..=ceiling`.
    #[must_use]
    pub const fn new(ceiling: u64) -> Self {
        Self { ceiling }
    }

    /// The configured ceiling.
    #[must_use]
    pub const fn ceiling(&self) -> u64 {
        self.ceiling
    }
}

impl ReplayPolicy for NonceCeiling {
    fn check_nonce(&self, _access_key: &str, nonce: Option<&str>) -> Result<(), AuthRejection> {
        match nonce.and_then(|raw| raw.trim().parse::<u64>().ok()) {
            Some(value) if value <= self.ceiling => Ok(()),
            _ => Err(AuthRejection::InvalidNonce),
        }
    }
}
