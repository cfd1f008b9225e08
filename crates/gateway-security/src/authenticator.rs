//! Signed-request authentication.
//!
//! Checks run in a fixed order and the first failure wins:
//! access key, nonce, timestamp, signature.

use crate::error::{AuthRejection, Result};
use crate::replay::{NonceCeiling, ReplayPolicy, ReplayWindow};
use crate::signing::{SignatureVerifier, SigningAlgorithm};
use gateway_config::AuthSettings;
use gateway_core::{AuthHeaders, Clock, Credential, CredentialStore, StaticCredentialStore};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{trace, warn};

/// Identity established by a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    access_key: String,
}

impl Principal {
    /// Access key the request was signed with.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }
}

/// Validates the five signed-request headers.
#[derive(Clone)]
pub struct RequestAuthenticator {
    credentials: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    replay: Arc<dyn ReplayPolicy>,
    window: ReplayWindow,
    verifier: SignatureVerifier,
}

impl RequestAuthenticator {
    /// Authenticator with the default replay window and HMAC-SHA256.
    pub fn new(credentials: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        let window = ReplayWindow::default();
        Self {
            credentials,
            clock,
            replay: Arc::new(NonceCeiling::new(window.nonce_ceiling)),
            window,
            verifier: SignatureVerifier::default(),
        }
    }

    /// Authenticator configured from the `auth` section.
    ///
    /// # Errors
    /// Returns error if the configured signing algorithm is unknown.
    pub fn from_settings(
        settings: &AuthSettings,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let algorithm: SigningAlgorithm = settings.algorithm.parse()?;
        Ok(Self::new(credentials, clock)
            .with_window(ReplayWindow::from_settings(settings))
            .with_algorithm(algorithm))
    }

    /// Replace the replay window. Resets the replay policy to a [`NonceCeiling`]
    /// for the new window, so call [`Self::with_replay_policy`] afterwards.
    #[must_use]
    pub fn with_window(mut self, window: ReplayWindow) -> Self {
        self.replay = Arc::new(NonceCeiling::new(window.nonce_ceiling));
        self.window = window;
        self
    }

    /// Replace the nonce policy.
    #[must_use]
    pub fn with_replay_policy(mut self, policy: Arc<dyn ReplayPolicy>) -> Self {
        self.replay = policy;
        self
    }

    /// Set the signing algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.verifier = SignatureVerifier::new(algorithm);
        self
    }

    /// The active replay window.
    #[must_use]
    pub const fn window(&self) -> &ReplayWindow {
        &self.window
    }

    /// Authenticate a request whose signature was computed over `body_for_signing`.
    ///
    /// # Errors
    /// Returns the first failed check as an [`AuthRejection`].
    pub async fn authenticate(
        &self,
        headers: &AuthHeaders,
        body_for_signing: &str,
    ) -> std::result::Result<Principal, AuthRejection> {
        let credential = self.resolve_key(headers.access_key.as_deref()).await?;

        self.replay
            .check_nonce(credential.access_key(), headers.nonce.as_deref())?;

        self.window
            .check_timestamp(headers.timestamp.as_deref(), self.clock.now_unix())?;

        let supplied = headers
            .sign
            .as_deref()
            .ok_or(AuthRejection::SignatureMismatch)?;
        if !self.verifier.verify(
            body_for_signing,
            credential.secret_key().expose_secret(),
            supplied,
        ) {
            return Err(AuthRejection::SignatureMismatch);
        }

        trace!(access_key = %credential.access_key(), "Signature verified");
        Ok(Principal {
            access_key: credential.access_key().to_string(),
        })
    }

    async fn resolve_key(
        &self,
        access_key: Option<&str>,
    ) -> std::result::Result<Credential, AuthRejection> {
        let access_key = access_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(AuthRejection::UnknownKey)?;

        self.credentials
            .lookup(access_key)
            .await
            .ok_or(AuthRejection::UnknownKey)
    }
}

impl std::fmt::Debug for RequestAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuthenticator")
            .field("window", &self.window)
            .field("algorithm", &self.verifier.algorithm())
            .finish_non_exhaustive()
    }
}

/// Build the credential store from configuration.
///
/// With no configured credentials the well-known placeholder credential is
/// installed so an unconfigured gateway still accepts the development key.
#[must_use]
pub fn credentials_from_settings(settings: &AuthSettings) -> StaticCredentialStore {
    if settings.credentials.is_empty() {
        warn!(
            access_key = gateway_core::credentials::PLACEHOLDER_ACCESS_KEY,
            "No credentials configured, accepting the placeholder credential only"
        );
        return StaticCredentialStore::placeholder();
    }

    settings
        .credentials
        .iter()
        .map(|c| Credential::new(c.access_key.trim(), c.secret_key.expose_secret().clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::RequestSigner;
    use gateway_config::CredentialSettings;
    use gateway_core::FixedClock;
    use secrecy::SecretString;

    const NOW: i64 = 1_700_000_000;

    fn authenticator() -> RequestAuthenticator {
        RequestAuthenticator::new(
            Arc::new(StaticCredentialStore::placeholder()),
            Arc::new(FixedClock::new(NOW)),
        )
    }

    fn signed(nonce: u64, timestamp: i64, body: &str) -> AuthHeaders {
        RequestSigner::new("asd", "asdasdasd")
            .sign_request(nonce, timestamp, body)
            .unwrap()
    }

    async fn run(
        auth: &RequestAuthenticator,
        headers: &AuthHeaders,
    ) -> std::result::Result<Principal, AuthRejection> {
        let body = headers.body.clone().unwrap_or_default();
        auth.authenticate(headers, &body).await
    }

    #[tokio::test]
    async fn test_accepts_valid_request() {
        let principal = run(&authenticator(), &signed(5, NOW - 10, "hello")).await.unwrap();
        assert_eq!(principal.access_key(), "asd");
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let auth = authenticator();

        let mut headers = signed(5, NOW, "hello");
        headers.access_key = Some("nobody".to_string());
        assert_eq!(run(&auth, &headers).await, Err(AuthRejection::UnknownKey));

        headers.access_key = Some(String::new());
        assert_eq!(run(&auth, &headers).await, Err(AuthRejection::UnknownKey));

        headers.access_key = None;
        assert_eq!(run(&auth, &headers).await, Err(AuthRejection::UnknownKey));
    }

    #[tokio::test]
    async fn test_nonce_ceiling() {
        let auth = authenticator();

        assert!(run(&auth, &signed(1000, NOW, "x")).await.is_ok());
        assert_eq!(
            run(&auth, &signed(1001, NOW, "x")).await,
            Err(AuthRejection::InvalidNonce)
        );

        let mut headers = signed(5, NOW, "x");
        headers.nonce = None;
        assert_eq!(run(&auth, &headers).await, Err(AuthRejection::InvalidNonce));
    }

    #[tokio::test]
    async fn test_timestamp_window() {
        let auth = authenticator();

        assert!(run(&auth, &signed(5, NOW - 299, "x")).await.is_ok());
        assert_eq!(
            run(&auth, &signed(5, NOW - 300, "x")).await,
            Err(AuthRejection::StaleTimestamp)
        );
        assert_eq!(
            run(&auth, &signed(5, NOW + 3600, "x")).await,
            Err(AuthRejection::StaleTimestamp)
        );
    }

    #[tokio::test]
    async fn test_signature_mismatch() {
        let auth = authenticator();

        let mut headers = signed(5, NOW, "hello");
        headers.body = Some("tampered".to_string());
        assert_eq!(run(&auth, &headers).await, Err(AuthRejection::SignatureMismatch));

        let mut headers = signed(5, NOW, "hello");
        headers.sign = None;
        assert_eq!(run(&auth, &headers).await, Err(AuthRejection::SignatureMismatch));

        let forged = RequestSigner::new("asd", "wrong-secret")
            .sign_request(5, NOW, "hello")
            .unwrap();
        assert_eq!(run(&auth, &forged).await, Err(AuthRejection::SignatureMismatch));
    }

    #[tokio::test]
    async fn test_first_failure_wins() {
        let auth = authenticator();

        // Bad nonce, stale timestamp and bad signature together: nonce is reported.
        let mut headers = signed(5000, NOW - 10_000, "hello");
        headers.sign = Some("00".to_string());
        assert_eq!(run(&auth, &headers).await, Err(AuthRejection::InvalidNonce));
    }

    #[tokio::test]
    async fn test_clock_is_consulted_per_call() {
        let clock = Arc::new(FixedClock::new(NOW));
        let auth = RequestAuthenticator::new(
            Arc::new(StaticCredentialStore::placeholder()),
            clock.clone(),
        );
        let headers = signed(5, NOW, "hello");

        assert!(run(&auth, &headers).await.is_ok());
        clock.advance(300);
        assert_eq!(run(&auth, &headers).await, Err(AuthRejection::StaleTimestamp));
    }

    #[tokio::test]
    async fn test_from_settings_uses_algorithm_and_window() {
        let settings = AuthSettings {
            nonce_ceiling: 10,
            algorithm: "SHA256-DIGEST".to_string(),
            ..AuthSettings::default()
        };
        let auth = RequestAuthenticator::from_settings(
            &settings,
            Arc::new(StaticCredentialStore::placeholder()),
            Arc::new(FixedClock::new(NOW)),
        )
        .unwrap();

        let digest = RequestSigner::new("asd", "asdasdasd")
            .with_algorithm(SigningAlgorithm::Sha256Digest)
            .sign_request(10, NOW, "hello")
            .unwrap();
        assert!(run(&auth, &digest).await.is_ok());

        let hmac = signed(10, NOW, "hello");
        assert_eq!(run(&auth, &hmac).await, Err(AuthRejection::SignatureMismatch));

        let over = RequestSigner::new("asd", "asdasdasd")
            .with_algorithm(SigningAlgorithm::Sha256Digest)
            .sign_request(11, NOW, "hello")
            .unwrap();
        assert_eq!(run(&auth, &over).await, Err(AuthRejection::InvalidNonce));
    }

    #[test]
    fn test_from_settings_rejects_unknown_algorithm() {
        let settings = AuthSettings {
            algorithm: "ROT13".to_string(),
            ..AuthSettings::default()
        };
        let result = RequestAuthenticator::from_settings(
            &settings,
            Arc::new(StaticCredentialStore::placeholder()),
            Arc::new(FixedClock::new(NOW)),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_credentials_from_settings() {
        let store = credentials_from_settings(&AuthSettings::default());
        assert!(store.lookup("asd").await.is_some());

        let settings = AuthSettings {
            credentials: vec![CredentialSettings {
                access_key: "client-a".to_string(),
                secret_key: SecretString::new("s".to_string()),
            }],
            ..AuthSettings::default()
        };
        let store = credentials_from_settings(&settings);
        assert!(store.lookup("client-a").await.is_some());
        assert!(store.lookup("asd").await.is_none());
    }
}
