//! Per-request view of an inbound call.
//!
//! A [`RequestContext`] is built once by the server for every inbound request
//! and handed to the filter, which owns it for the lifetime of that request.
//! [`AuthHeaders`] is the typed view over the five signed-request headers.

use crate::error::{CoreError, CoreResult};
use http::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use http::{Method, Uri};
use std::fmt;
use std::net::SocketAddr;

/// Header carrying the caller's access key.
pub const ACCESS_KEY_HEADER: &str = "accesskey";
/// Header carrying the caller's nonce.
pub const NONCE_HEADER: &str = "nonce";
/// Header carrying the canonical payload the signature was computed over.
pub const BODY_HEADER: &str = "body";
/// Header carrying the request timestamp in Unix seconds.
pub const TIMESTAMP_HEADER: &str = "timestamp";
/// Header carrying the request signature.
pub const SIGN_HEADER: &str = "sign";

/// Unique request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new random request id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing id (e.g. propagated from `x-request-id`).
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable per-request view: source address, method, target and headers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    id: RequestId,
    remote_address: String,
    local_address: Option<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestContext {
    /// Create a context for a request received from `remote_address`.
    ///
    /// `remote_address` is the textual host of the caller, without port.
    #[must_use]
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        remote_address: impl Into<String>,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            remote_address: remote_address.into(),
            local_address: None,
            method,
            uri,
            headers,
        }
    }

    /// Override the generated request id.
    #[must_use]
    pub fn with_id(mut self, id: RequestId) -> Self {
        self.id = id;
        self
    }

    /// Record the local socket the request arrived on.
    #[must_use]
    pub fn with_local_address(mut self, addr: SocketAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    /// Request id.
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Source host of the caller.
    #[must_use]
    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    /// Local socket address, when known.
    #[must_use]
    pub fn local_address(&self) -> Option<SocketAddr> {
        self.local_address
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request target.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Inbound headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Names of the cookies sent with the request. Values are never exposed
    /// here so they cannot end up in logs.
    #[must_use]
    pub fn cookie_names(&self) -> Vec<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.split('=').next())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Typed view over the signed-request headers.
    #[must_use]
    pub fn auth_headers(&self) -> AuthHeaders {
        AuthHeaders::from_headers(&self.headers)
    }
}

/// The five signed-request header values.
///
/// Every field is optional: a missing header is a validation failure for the
/// authenticator to report, never a parse error here.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders {
    /// Caller access key.
    pub access_key: Option<String>,
    /// Nonce, expected to encode a non-negative integer.
    pub nonce: Option<String>,
    /// Canonical payload the signature was computed over.
    pub body: Option<String>,
    /// Unix seconds at which the caller signed the request.
    pub timestamp: Option<String>,
    /// Signature over `body`.
    pub sign: Option<String>,
}

impl AuthHeaders {
    /// Extract the signed-request headers from a header map.
    ///
    /// Lookups are case-insensitive. Values are decoded as UTF-8 so callers
    /// may sign non-ASCII payloads; a value that is not valid UTF-8 is
    /// treated as absent.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            access_key: header_string(headers, ACCESS_KEY_HEADER),
            nonce: header_string(headers, NONCE_HEADER),
            body: header_string(headers, BODY_HEADER),
            timestamp: header_string(headers, TIMESTAMP_HEADER),
            sign: header_string(headers, SIGN_HEADER),
        }
    }

    /// Write the present fields into `headers`, replacing existing values.
    ///
    /// # Errors
    /// Returns an error if a value contains bytes not allowed in a header.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> CoreResult<()> {
        let fields = [
            (ACCESS_KEY_HEADER, &self.access_key),
            (NONCE_HEADER, &self.nonce),
            (BODY_HEADER, &self.body),
            (TIMESTAMP_HEADER, &self.timestamp),
            (SIGN_HEADER, &self.sign),
        ];

        for (name, value) in fields {
            if let Some(value) = value {
                let value = HeaderValue::from_bytes(value.as_bytes()).map_err(|e| {
                    CoreError::invalid_request(format!("header '{name}' is not encodable: {e}"))
                })?;
                headers.insert(HeaderName::from_static(name), value);
            }
        }

        Ok(())
    }
}

impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("access_key", &self.access_key)
            .field("nonce", &self.nonce)
            .field("body", &self.body.as_ref().map(String::len))
            .field("timestamp", &self.timestamp)
            .field("sign", &self.sign.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| String::from_utf8(value.as_bytes().to_vec()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_auth_headers_case_insensitive() {
        let map = headers(&[
            ("accessKey", "asd"),
            ("NONCE", "5"),
            ("Body", "hello"),
            ("timestamp", "1700000000"),
            ("Sign", "abc"),
        ]);

        let auth = AuthHeaders::from_headers(&map);
        assert_eq!(auth.access_key.as_deref(), Some("asd"));
        assert_eq!(auth.nonce.as_deref(), Some("5"));
        assert_eq!(auth.body.as_deref(), Some("hello"));
        assert_eq!(auth.timestamp.as_deref(), Some("1700000000"));
        assert_eq!(auth.sign.as_deref(), Some("abc"));
    }

    #[test]
    fn test_auth_headers_missing() {
        let auth = AuthHeaders::from_headers(&HeaderMap::new());
        assert_eq!(auth, AuthHeaders::default());
    }

    #[test]
    fn test_auth_headers_utf8_body() {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_static(BODY_HEADER),
            HeaderValue::from_bytes("你好".as_bytes()).unwrap(),
        );

        let auth = AuthHeaders::from_headers(&map);
        assert_eq!(auth.body.as_deref(), Some("你好"));
    }

    #[test]
    fn test_auth_headers_debug_redacts_sign() {
        let auth = AuthHeaders {
            sign: Some("deadbeef".to_string()),
            ..Default::default()
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("deadbeef"));
    }

    #[test]
    fn test_apply_to_skips_absent_fields() {
        let auth = AuthHeaders {
            access_key: Some("asd".to_string()),
            body: Some("héllo".to_string()),
            ..Default::default()
        };

        let mut map = headers(&[("nonce", "stale")]);
        auth.apply_to(&mut map).unwrap();

        assert_eq!(map.get("accessKey").unwrap(), "asd");
        assert_eq!(map.get("nonce").unwrap(), "stale");
        assert!(map.get(SIGN_HEADER).is_none());
        assert_eq!(AuthHeaders::from_headers(&map).body.as_deref(), Some("héllo"));
    }

    #[test]
    fn test_apply_to_rejects_control_bytes() {
        let auth = AuthHeaders {
            body: Some("line\nbreak".to_string()),
            ..Default::default()
        };
        assert!(auth.apply_to(&mut HeaderMap::new()).is_err());
    }

    #[test]
    fn test_context_accessors() {
        let ctx = RequestContext::new(
            Method::POST,
            "/api/name?user=a".parse().unwrap(),
            headers(&[("cookie", "session=1; theme=dark")]),
            "127.0.0.1",
        )
        .with_local_address("127.0.0.1:8090".parse().unwrap());

        assert_eq!(ctx.remote_address(), "127.0.0.1");
        assert_eq!(ctx.path(), "/api/name");
        assert_eq!(ctx.query(), Some("user=a"));
        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.cookie_names(), vec!["session", "theme"]);
        assert!(ctx.local_address().is_some());
    }

    #[test]
    fn test_request_ids_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
        assert_eq!(RequestId::new("abc").as_str(), "abc");
    }
}
