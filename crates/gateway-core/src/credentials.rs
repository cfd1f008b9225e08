//! Access-key credentials and their lookup.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;

/// Access key used when no credentials are provisioned.
pub const PLACEHOLDER_ACCESS_KEY: &str = "asd";
/// Secret paired with [`PLACEHOLDER_ACCESS_KEY`].
pub const PLACEHOLDER_SECRET_KEY: &str = "asdasdasd";

/// An `(accessKey, secretKey)` pair.
#[derive(Clone)]
pub struct Credential {
    access_key: String,
    secret_key: SecretString,
}

impl Credential {
    /// Create a credential.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: SecretString::new(secret_key.into()),
        }
    }

    /// The public access key.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// The shared secret.
    #[must_use]
    pub fn secret_key(&self) -> &SecretString {
        &self.secret_key
    }

    /// The shared secret as a plain string slice.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Resolves an access key to its credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up the credential for `access_key`, `None` if it is not provisioned.
    async fn lookup(&self, access_key: &str) -> Option<Credential>;
}

/// Read-only in-memory credential store, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    credentials: HashMap<String, Credential>,
}

impl StaticCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding only the placeholder credential.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::new().with_credential(Credential::new(
            PLACEHOLDER_ACCESS_KEY,
            PLACEHOLDER_SECRET_KEY,
        ))
    }

    /// Add a credential. A later credential for the same key replaces the earlier one.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials
            .insert(credential.access_key().to_string(), credential);
        self
    }

    /// Number of provisioned keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether no key is provisioned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl FromIterator<Credential> for StaticCredentialStore {
    fn from_iter<I: IntoIterator<Item = Credential>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |store, credential| store.with_credential(credential))
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn lookup(&self, access_key: &str) -> Option<Credential> {
        self.credentials.get(access_key).cloned()
    }
}
