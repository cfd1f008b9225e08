//! Response interception.
//!
//! A successful chunked response is re-emitted through a stream adapter that
//! copies every chunk into an owned buffer, releases the upstream chunk, feeds
//! a bounded capture used only for logging, and forwards the copy unchanged.
//! One chunk is in flight at a time, so a slow caller throttles the upstream.
//! Anything else passes through untouched, except a success response whose
//! body is not a chunked stream, which is turned into a 500.

use crate::error::{Result, ServerError, SinkError};
use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use bytes::Bytes;
use futures::Stream;
use gateway_config::InterceptorSettings;
use gateway_core::{BoxError, ChunkStream, DownstreamBody, DownstreamResponse, RequestId};
use pin_project_lite::pin_project;
use std::borrow::Cow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, error, info, trace, warn};

/// Default bound on captured body bytes.
pub const DEFAULT_CAPTURE_LIMIT: usize = 64 * 1024;

/// Logging side channel: what the interceptor observed of one response.
///
/// Never forwarded; the caller always receives the original bytes.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    status: StatusCode,
    captured: Vec<u8>,
    limit: usize,
    total_bytes: u64,
    chunks: usize,
    truncated: bool,
}

impl InterceptedResponse {
    /// Empty capture for a response with `status`, keeping at most `limit` bytes.
    #[must_use]
    pub fn new(status: StatusCode, limit: usize) -> Self {
        Self {
            status,
            captured: Vec::new(),
            limit,
            total_bytes: 0,
            chunks: 0,
            truncated: false,
        }
    }

    fn record(&mut self, chunk: &[u8], keep: bool) {
        self.chunks += 1;
        self.total_bytes += chunk.len() as u64;

        if !keep {
            self.truncated = true;
            return;
        }

        let room = self.limit.saturating_sub(self.captured.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.captured.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    /// Status of the observed response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Captured body, decoded as UTF-8 with replacement of invalid sequences.
    #[must_use]
    pub fn body(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.captured)
    }

    /// Raw captured bytes.
    #[must_use]
    pub fn captured_bytes(&self) -> &[u8] {
        &self.captured
    }

    /// Bytes forwarded so far, captured or not.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Chunks forwarded so far.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Whether the capture is missing part of the forwarded body.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// How a tapped response stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The upstream stream ended normally.
    Completed,
    /// The upstream stream yielded an error, forwarded as the terminal item.
    Failed(String),
    /// The caller went away before the stream ended.
    Cancelled,
}

/// Receives what the interceptor observes.
///
/// `begin` failing aborts interception for that response, which is then passed
/// through unmodified. `chunk` failing only stops the capture.
pub trait ResponseLogSink: Send + Sync {
    /// A success response is about to be tapped.
    fn begin(
        &self,
        request_id: &RequestId,
        status: StatusCode,
    ) -> std::result::Result<(), SinkError>;

    /// One chunk was forwarded to the caller.
    fn chunk(
        &self,
        request_id: &RequestId,
        index: usize,
        chunk: &[u8],
    ) -> std::result::Result<(), SinkError>;

    /// The tapped stream ended. Called exactly once per tapped response.
    fn finish(
        &self,
        request_id: &RequestId,
        outcome: &StreamOutcome,
        response: &InterceptedResponse,
    );
}

/// Sink writing to `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct TracingLogSink {
    log_chunks: bool,
}

impl TracingLogSink {
    /// Create a sink; `log_chunks` enables one debug line per chunk.
    #[must_use]
    pub const fn new(log_chunks: bool) -> Self {
        Self { log_chunks }
    }
}

impl Default for TracingLogSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ResponseLogSink for TracingLogSink {
    fn begin(
        &self,
        request_id: &RequestId,
        status: StatusCode,
    ) -> std::result::Result<(), SinkError> {
        debug!(request_id = %request_id, status = status.as_u16(), "Capturing response body");
        Ok(())
    }

    fn chunk(
        &self,
        request_id: &RequestId,
        index: usize,
        chunk: &[u8],
    ) -> std::result::Result<(), SinkError> {
        if self.log_chunks {
            debug!(
                request_id = %request_id,
                chunk = index,
                bytes = chunk.len(),
                text = %String::from_utf8_lossy(chunk),
                "Response chunk"
            );
        }
        Ok(())
    }

    fn finish(
        &self,
        request_id: &RequestId,
        outcome: &StreamOutcome,
        response: &InterceptedResponse,
    ) {
        match outcome {
            StreamOutcome::Completed => info!(
                request_id = %request_id,
                status = response.status().as_u16(),
                bytes = response.total_bytes(),
                chunks = response.chunk_count(),
                truncated = response.is_truncated(),
                body = %response.body(),
                "<--- {}",
                response.status()
            ),
            StreamOutcome::Failed(reason) => error!(
                request_id = %request_id,
                error = %reason,
                bytes = response.total_bytes(),
                chunks = response.chunk_count(),
                "Upstream body failed mid-stream"
            ),
            StreamOutcome::Cancelled => warn!(
                request_id = %request_id,
                bytes = response.total_bytes(),
                chunks = response.chunk_count(),
                "Response stream cancelled before completion"
            ),
        }
    }
}

/// Wraps downstream responses on their way back to the caller.
#[derive(Clone)]
pub struct ResponseInterceptor {
    success_status: StatusCode,
    capture_limit: usize,
    sink: Arc<dyn ResponseLogSink>,
}

impl ResponseInterceptor {
    /// Interceptor capturing `200` responses up to [`DEFAULT_CAPTURE_LIMIT`] bytes.
    pub fn new(sink: Arc<dyn ResponseLogSink>) -> Self {
        Self {
            success_status: StatusCode::OK,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
            sink,
        }
    }

    /// Interceptor configured from the `interceptor` section, logging through `tracing`.
    ///
    /// # Errors
    /// Returns error if the success status is not a valid status code.
    pub fn from_settings(settings: &InterceptorSettings) -> Result<Self> {
        let status = StatusCode::from_u16(settings.success_status).map_err(|e| {
            ServerError::config(format!(
                "interceptor.success_status {}: {e}",
                settings.success_status
            ))
        })?;

        Ok(Self::new(Arc::new(TracingLogSink::new(settings.log_chunks)))
            .with_success_status(status)
            .with_capture_limit(settings.capture_limit_bytes))
    }

    /// Set the status that switches from pass-through to capture.
    #[must_use]
    pub fn with_success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    /// Set the capture bound.
    #[must_use]
    pub fn with_capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = limit;
        self
    }

    /// Replace the log sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ResponseLogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The status that triggers capture.
    #[must_use]
    pub fn success_status(&self) -> StatusCode {
        self.success_status
    }

    /// Turn a downstream response into the response sent to the caller.
    pub fn intercept(
        &self,
        request_id: &RequestId,
        response: DownstreamResponse,
    ) -> Response<Body> {
        let DownstreamResponse {
            status,
            headers,
            body,
        } = response;

        if status != self.success_status {
            trace!(request_id = %request_id, status = status.as_u16(), "Passing response through");
            return build(status, headers, into_body(body));
        }

        match body {
            DownstreamBody::Opaque(bytes) => {
                error!(
                    request_id = %request_id,
                    status = status.as_u16(),
                    bytes = bytes.len(),
                    "Downstream body is not a chunked stream, responding 500"
                );
                build(StatusCode::INTERNAL_SERVER_ERROR, headers, Body::from(bytes))
            }
            DownstreamBody::Chunked(stream) => {
                if let Err(e) = self.sink.begin(request_id, status) {
                    warn!(
                        request_id = %request_id,
                        error = %e,
                        "Response interception failed, passing response through"
                    );
                    return build(status, headers, Body::from_stream(stream));
                }

                let tap = Tap {
                    request_id: request_id.clone(),
                    sink: Arc::clone(&self.sink),
                    capture: InterceptedResponse::new(status, self.capture_limit),
                    capturing: true,
                    finished: false,
                };
                build(status, headers, Body::from_stream(InterceptStream { inner: stream, tap }))
            }
        }
    }
}

impl std::fmt::Debug for ResponseInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseInterceptor")
            .field("success_status", &self.success_status)
            .field("capture_limit", &self.capture_limit)
            .finish_non_exhaustive()
    }
}

fn into_body(body: DownstreamBody) -> Body {
    match body {
        DownstreamBody::Chunked(stream) => Body::from_stream(stream),
        DownstreamBody::Opaque(bytes) => Body::from(bytes),
    }
}

fn build(status: StatusCode, headers: HeaderMap, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Per-response capture state. Reports cancellation when dropped unfinished.
struct Tap {
    request_id: RequestId,
    sink: Arc<dyn ResponseLogSink>,
    capture: InterceptedResponse,
    capturing: bool,
    finished: bool,
}

impl Tap {
    fn observe(&mut self, chunk: &[u8]) {
        let index = self.capture.chunk_count();

        if self.capturing {
            if let Err(e) = self.sink.chunk(&self.request_id, index, chunk) {
                self.capturing = false;
                warn!(
                    request_id = %self.request_id,
                    error = %e,
                    "Response log sink failed, capture disabled for this response"
                );
            }
        }

        self.capture.record(chunk, self.capturing);
    }

    fn finish(&mut self, outcome: &StreamOutcome) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.sink.finish(&self.request_id, outcome, &self.capture);
    }
}

impl Drop for Tap {
    fn drop(&mut self) {
        self.finish(&StreamOutcome::Cancelled);
    }
}

pin_project! {
    struct InterceptStream {
        #[pin]
        inner: ChunkStream,
        tap: Tap,
    }
}

impl Stream for InterceptStream {
    type Item = std::result::Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if this.tap.finished {
            return Poll::Ready(None);
        }

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let owned = Bytes::copy_from_slice(&chunk);
                drop(chunk);
                this.tap.observe(&owned);
                Poll::Ready(Some(Ok(owned)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.tap.finish(&StreamOutcome::Failed(e.to_string()));
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.tap.finish(&StreamOutcome::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Begin(StatusCode),
        Chunk(usize, Vec<u8>),
        Finish(StreamOutcome, String, bool),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
        fail_begin: bool,
        fail_chunk: bool,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ResponseLogSink for RecordingSink {
        fn begin(
            &self,
            _: &RequestId,
            status: StatusCode,
        ) -> std::result::Result<(), SinkError> {
            if self.fail_begin {
                return Err(SinkError("begin".to_string()));
            }
            self.events.lock().unwrap().push(Event::Begin(status));
            Ok(())
        }

        fn chunk(
            &self,
            _: &RequestId,
            index: usize,
            chunk: &[u8],
        ) -> std::result::Result<(), SinkError> {
            if self.fail_chunk {
                return Err(SinkError("chunk".to_string()));
            }
            self.events.lock().unwrap().push(Event::Chunk(index, chunk.to_vec()));
            Ok(())
        }

        fn finish(
            &self,
            _: &RequestId,
            outcome: &StreamOutcome,
            response: &InterceptedResponse,
        ) {
            self.events.lock().unwrap().push(Event::Finish(
                outcome.clone(),
                response.body().into_owned(),
                response.is_truncated(),
            ));
        }
    }

    fn interceptor(sink: &Arc<RecordingSink>) -> ResponseInterceptor {
        ResponseInterceptor::new(sink.clone())
    }

    async fn frames(response: Response<Body>) -> Vec<Bytes> {
        response
            .into_body()
            .into_data_stream()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_chunks_forwarded_in_order_and_captured() {
        let sink = Arc::new(RecordingSink::default());
        let response =
            DownstreamResponse::new(StatusCode::OK, DownstreamBody::chunks(["ab", "cd"]));

        let out = interceptor(&sink).intercept(&RequestId::new("r1"), response);
        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(frames(out).await, vec!["ab", "cd"]);

        assert_eq!(
            sink.events(),
            vec![
                Event::Begin(StatusCode::OK),
                Event::Chunk(0, b"ab".to_vec()),
                Event::Chunk(1, b"cd".to_vec()),
                Event::Finish(StreamOutcome::Completed, "abcd".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_success_passes_through() {
        let sink = Arc::new(RecordingSink::default());
        let mut headers = HeaderMap::new();
        headers.insert("x-upstream", "yes".parse().unwrap());
        let response =
            DownstreamResponse::new(StatusCode::NOT_FOUND, DownstreamBody::chunks(["missing"]))
                .with_headers(headers);

        let out = interceptor(&sink).intercept(&RequestId::new("r2"), response);
        assert_eq!(out.status(), StatusCode::NOT_FOUND);
        assert_eq!(out.headers()["x-upstream"], "yes");
        assert_eq!(frames(out).await, vec!["missing"]);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_configured_success_status() {
        let sink = Arc::new(RecordingSink::default());
        let interceptor = interceptor(&sink).with_success_status(StatusCode::CREATED);

        let ok = DownstreamResponse::new(StatusCode::OK, DownstreamBody::chunks(["x"]));
        frames(interceptor.intercept(&RequestId::new("a"), ok)).await;
        assert!(sink.events().is_empty());

        let created = DownstreamResponse::new(StatusCode::CREATED, DownstreamBody::chunks(["x"]));
        frames(interceptor.intercept(&RequestId::new("b"), created)).await;
        assert_eq!(sink.events().first(), Some(&Event::Begin(StatusCode::CREATED)));
    }

    #[tokio::test]
    async fn test_opaque_body_becomes_500() {
        let sink = Arc::new(RecordingSink::default());
        let response = DownstreamResponse::new(
            StatusCode::OK,
            DownstreamBody::Opaque(Bytes::from_static(b"whatever")),
        );

        let out = interceptor(&sink).intercept(&RequestId::new("r3"), response);
        assert_eq!(out.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(frames(out).await.concat(), b"whatever");
    }

    #[tokio::test]
    async fn test_opaque_body_on_error_status_untouched() {
        let sink = Arc::new(RecordingSink::default());
        let response = DownstreamResponse::new(
            StatusCode::BAD_GATEWAY,
            DownstreamBody::Opaque(Bytes::from_static(b"bad")),
        );

        let out = interceptor(&sink).intercept(&RequestId::new("r4"), response);
        assert_eq!(out.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_capture_limit_truncates_capture_only() {
        let sink = Arc::new(RecordingSink::default());
        let response =
            DownstreamResponse::new(StatusCode::OK, DownstreamBody::chunks(["ab", "cd"]));

        let out = interceptor(&sink)
            .with_capture_limit(3)
            .intercept(&RequestId::new("r5"), response);
        assert_eq!(frames(out).await, vec!["ab", "cd"]);

        assert_eq!(
            sink.events().last(),
            Some(&Event::Finish(StreamOutcome::Completed, "abc".to_string(), true))
        );
    }

    #[tokio::test]
    async fn test_multibyte_split_across_chunks() {
        let sink = Arc::new(RecordingSink::default());
        let text = "héllo".as_bytes();
        let (a, b) = text.split_at(2);
        let response = DownstreamResponse::new(
            StatusCode::OK,
            DownstreamBody::chunks([Bytes::copy_from_slice(a), Bytes::copy_from_slice(b)]),
        );

        let out = interceptor(&sink).intercept(&RequestId::new("r6"), response);
        assert_eq!(frames(out).await.concat(), text);
        assert_eq!(
            sink.events().last(),
            Some(&Event::Finish(StreamOutcome::Completed, "héllo".to_string(), false))
        );
    }

    #[tokio::test]
    async fn test_sink_begin_failure_passes_through() {
        let sink = Arc::new(RecordingSink {
            fail_begin: true,
            ..Default::default()
        });
        let response =
            DownstreamResponse::new(StatusCode::OK, DownstreamBody::chunks(["ab", "cd"]));

        let out = interceptor(&sink).intercept(&RequestId::new("r7"), response);
        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(frames(out).await, vec!["ab", "cd"]);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_sink_chunk_failure_keeps_forwarding() {
        let sink = Arc::new(RecordingSink {
            fail_chunk: true,
            ..Default::default()
        });
        let response =
            DownstreamResponse::new(StatusCode::OK, DownstreamBody::chunks(["ab", "cd"]));

        let out = interceptor(&sink).intercept(&RequestId::new("r8"), response);
        assert_eq!(frames(out).await, vec!["ab", "cd"]);

        assert_eq!(
            sink.events(),
            vec![
                Event::Begin(StatusCode::OK),
                Event::Finish(StreamOutcome::Completed, String::new(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_upstream_error_is_terminal() {
        let sink = Arc::new(RecordingSink::default());
        let chunks: Vec<std::result::Result<Bytes, BoxError>> =
            vec![Ok(Bytes::from_static(b"ab")), Err("connection reset".into())];
        let response = DownstreamResponse::new(
            StatusCode::OK,
            DownstreamBody::from_stream(stream::iter(chunks)),
        );

        let out = interceptor(&sink).intercept(&RequestId::new("r9"), response);
        let items: Vec<_> = out.into_body().into_data_stream().collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "ab");
        assert!(items[1].is_err());
        assert_eq!(
            sink.events().last(),
            Some(&Event::Finish(
                StreamOutcome::Failed("connection reset".to_string()),
                "ab".to_string(),
                false
            ))
        );
    }

    #[tokio::test]
    async fn test_cancellation_reported_once() {
        let sink = Arc::new(RecordingSink::default());
        let upstream = stream::iter(vec![Ok::<_, BoxError>(Bytes::from_static(b"ab"))])
            .chain(stream::pending());
        let response =
            DownstreamResponse::new(StatusCode::OK, DownstreamBody::from_stream(upstream));

        let out = interceptor(&sink).intercept(&RequestId::new("r10"), response);
        let mut body = out.into_body().into_data_stream();
        assert_eq!(body.next().await.unwrap().unwrap(), "ab");
        drop(body);

        let finishes: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Finish(..)))
            .collect();
        assert_eq!(
            finishes,
            vec![Event::Finish(StreamOutcome::Cancelled, "ab".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_pulls_one_chunk_per_read() {
        let sink = Arc::new(RecordingSink::default());
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let chunks = (0..10).map(|_| Ok::<_, BoxError>(Bytes::from_static(b"ab")));
        let upstream = stream::iter(chunks).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let response =
            DownstreamResponse::new(StatusCode::OK, DownstreamBody::from_stream(upstream));

        let out = interceptor(&sink).intercept(&RequestId::new("r11"), response);
        assert_eq!(pulled.load(Ordering::SeqCst), 0);

        let mut body = out.into_body().into_data_stream();
        body.next().await.unwrap().unwrap();
        body.next().await.unwrap().unwrap();
        assert_eq!(pulled.load(Ordering::SeqCst), 2);

        drop(body);
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_output_identical_for_any_chunk_size() {
        let text: String = (0..5000u32)
            .map(|i| char::from(b'a' + u8::try_from(i % 26).unwrap()))
            .collect();

        for size in [1, 3, 7, 64, 4999, 5000, 6000] {
            let sink = Arc::new(RecordingSink::default());
            let chunks: Vec<Bytes> = text
                .as_bytes()
                .chunks(size)
                .map(Bytes::copy_from_slice)
                .collect();
            let response = DownstreamResponse::new(StatusCode::OK, DownstreamBody::chunks(chunks));

            let out = interceptor(&sink).intercept(&RequestId::new("r12"), response);
            assert_eq!(frames(out).await.concat(), text.as_bytes(), "chunk size {size}");
            assert_eq!(
                sink.events().last(),
                Some(&Event::Finish(StreamOutcome::Completed, text.clone(), false)),
                "chunk size {size}"
            );
        }
    }

    #[test]
    fn test_from_settings() {
        let settings = InterceptorSettings {
            success_status: 204,
            capture_limit_bytes: 10,
            log_chunks: false,
        };
        let interceptor = ResponseInterceptor::from_settings(&settings).unwrap();
        assert_eq!(interceptor.success_status(), StatusCode::NO_CONTENT);

        let bad = InterceptorSettings {
            success_status: 1000,
            ..InterceptorSettings::default()
        };
        assert!(ResponseInterceptor::from_settings(&bad).is_err());
    }
}
