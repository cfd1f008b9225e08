//! HTTP forwarding to the upstream service.

use crate::error::{Result, ServerError};
use async_trait::async_trait;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName};
use futures::TryStreamExt;
use gateway_config::ServerSettings;
use gateway_core::{
    BoxError, ChunkStream, CoreError, CoreResult, Downstream, DownstreamBody, DownstreamResponse,
    RequestContext,
};
use reqwest::{redirect, Client};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Forwards admitted requests to a fixed upstream base URL.
///
/// Both bodies stream: the request body is sent as it arrives and the
/// response body is returned as soon as the upstream sends its head.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpForwarder {
    /// Forwarder targeting `base_url`.
    ///
    /// `request_timeout` bounds the wait for the upstream response head only.
    ///
    /// # Errors
    /// Returns error if the URL is not an absolute http(s) URL or the client
    /// cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServerError::config(format!("upstream url '{base_url}': {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ServerError::config(format!(
                "upstream url scheme '{}' is not http or https",
                base_url.scheme()
            )));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(redirect::Policy::none())
            .no_gzip()
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| ServerError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    /// Forwarder configured from the `server` section.
    ///
    /// # Errors
    /// See [`Self::new`].
    pub fn from_settings(settings: &ServerSettings) -> Result<Self> {
        Self::new(&settings.upstream_url, settings.request_timeout)
    }

    /// Upstream base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn target(&self, ctx: &RequestContext) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}{}", url.path().trim_end_matches('/'), ctx.path());
        url.set_path(&path);
        url.set_query(ctx.query());
        url
    }
}

#[async_trait]
impl Downstream for HttpForwarder {
    #[instrument(skip_all, fields(request_id = %ctx.id()))]
    async fn invoke(
        &self,
        ctx: &RequestContext,
        body: ChunkStream,
    ) -> CoreResult<DownstreamResponse> {
        let url = self.target(ctx);
        debug!(url = %url, method = %ctx.method(), "Forwarding request");

        let mut request = self
            .client
            .request(ctx.method().clone(), url)
            .headers(strip_hop_by_hop(ctx.headers(), true));
        if has_body(ctx.headers()) {
            request = request.body(reqwest::Body::wrap_stream(body));
        }

        let response = tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| {
                CoreError::downstream(format!(
                    "no response within {}s",
                    self.request_timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| CoreError::downstream(e.to_string()))?;

        let status = response.status();
        let headers = strip_hop_by_hop(response.headers(), false);
        debug!(status = status.as_u16(), "Upstream responded");

        let body = DownstreamBody::from_stream(
            response
                .bytes_stream()
                .map_err(|e| Box::new(e) as BoxError),
        );
        Ok(DownstreamResponse::new(status, body).with_headers(headers))
    }
}

fn has_body(headers: &HeaderMap) -> bool {
    headers.contains_key(CONTENT_LENGTH) || headers.contains_key(TRANSFER_ENCODING)
}

/// Copy `headers` without connection-scoped entries, including any the
/// `Connection` header names. `drop_host` also removes `Host`.
fn strip_hop_by_hop(headers: &HeaderMap, drop_host: bool) -> HeaderMap {
    let named: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if HOP_BY_HOP.contains(&name.as_str())
            || named.contains(name)
            || (drop_host && *name == HOST)
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
