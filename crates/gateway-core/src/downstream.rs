//! Downstream invocation seam and the chunked body model.
//!
//! The gateway never looks inside a body beyond observing its chunks: a body
//! is a finite, ordered, lazily produced sequence of [`Bytes`] chunks.

use crate::error::CoreResult;
use crate::request::RequestContext;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use http::{HeaderMap, StatusCode};
use std::fmt;

/// Boxed error carried by body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One lazily produced sequence of body chunks.
pub type ChunkStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// Body of a downstream response, as produced by the invocation.
pub enum DownstreamBody {
    /// A chunked byte stream, the shape the interceptor knows how to tap.
    Chunked(ChunkStream),
    /// A body in a shape the interceptor does not recognize as a chunked stream.
    Opaque(Bytes),
}

impl DownstreamBody {
    /// Chunked body from an existing stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self::Chunked(stream.boxed())
    }

    /// Chunked body yielding `chunks` in order.
    pub fn chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let chunks: Vec<Result<Bytes, BoxError>> =
            chunks.into_iter().map(|chunk| Ok(chunk.into())).collect();
        Self::Chunked(stream::iter(chunks).boxed())
    }

    /// Chunked body with no chunks.
    #[must_use]
    pub fn empty() -> Self {
        Self::Chunked(stream::empty().boxed())
    }

    /// Whether the body is a chunked stream.
    #[must_use]
    pub fn is_chunked(&self) -> bool {
        matches!(self, Self::Chunked(_))
    }
}

impl fmt::Debug for DownstreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunked(_) => f.write_str("DownstreamBody::Chunked(..)"),
            Self::Opaque(bytes) => write!(f, "DownstreamBody::Opaque({} bytes)", bytes.len()),
        }
    }
}

/// Response produced by a downstream invocation.
#[derive(Debug)]
pub struct DownstreamResponse {
    /// Status chosen by the downstream service.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: DownstreamBody,
}

impl DownstreamResponse {
    /// Create a response without headers.
    #[must_use]
    pub fn new(status: StatusCode, body: DownstreamBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Replace the response headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Invokes the routed backend for an admitted request.
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Forward the request and return the response as soon as its head is available.
    ///
    /// The body is streamed lazily; this call must not wait for the full body.
    async fn invoke(
        &self,
        ctx: &RequestContext,
        body: ChunkStream,
    ) -> CoreResult<DownstreamResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_preserve_order() {
        let DownstreamBody::Chunked(stream) = DownstreamBody::chunks(["ab", "cd", "ef"]) else {
            panic!("expected chunked body");
        };

        let collected: Vec<Bytes> = stream.map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(collected, vec!["ab", "cd", "ef"]);
    }

    #[tokio::test]
    async fn test_empty_body() {
        let DownstreamBody::Chunked(stream) = DownstreamBody::empty() else {
            panic!("expected chunked body");
        };
        assert_eq!(stream.count().await, 0);
    }

    #[test]
    fn test_debug_shape() {
        assert!(DownstreamBody::empty().is_chunked());

        let opaque = DownstreamBody::Opaque(Bytes::from_static(b"abc"));
        assert!(!opaque.is_chunked());
        assert_eq!(format!("{opaque:?}"), "DownstreamBody::Opaque(3 bytes)");
    }
}
