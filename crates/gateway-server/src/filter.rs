//! The ingress filter: whitelist, authentication, downstream call, interception.
//!
//! Each request walks a fixed sequence of states and stops at the first
//! failure:
//!
//! ```text
//! Start -> WhitelistChecked -> Authenticated -> Invoked -> ResponseIntercepted -> Done
//!   \________________\_______________\___________\
//!                                                  -> Error
//! ```

use crate::error::ServerError;
use crate::interceptor::ResponseInterceptor;
use axum::body::Body;
use axum::http::Response;
use axum::response::IntoResponse;
use futures::{StreamExt, TryStreamExt};
use gateway_core::{BoxError, ChunkStream, Downstream, RequestContext};
use gateway_security::{RequestAuthenticator, SecurityError, Whitelist};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// Where a request is in the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Request received.
    Start,
    /// Source address admitted.
    WhitelistChecked,
    /// Signed headers verified.
    Authenticated,
    /// Downstream returned a response head.
    Invoked,
    /// Response handed to the interceptor.
    ResponseIntercepted,
    /// Response returned to the caller.
    Done,
    /// Request refused or failed.
    Error,
}

impl FilterState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::WhitelistChecked => "whitelist_checked",
            Self::Authenticated => "authenticated",
            Self::Invoked => "invoked",
            Self::ResponseIntercepted => "response_intercepted",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Request counters.
#[derive(Debug, Default)]
pub struct FilterStats {
    received: AtomicU64,
    forbidden: AtomicU64,
    invoked: AtomicU64,
    upstream_failures: AtomicU64,
}

impl FilterStats {
    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> FilterStatsSnapshot {
        FilterStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            forbidden: self.forbidden.load(Ordering::Relaxed),
            invoked: self.invoked.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`FilterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStatsSnapshot {
    /// Requests that entered the filter.
    pub received: u64,
    /// Requests refused with 403.
    pub forbidden: u64,
    /// Requests for which the downstream returned a response.
    pub invoked: u64,
    /// Downstream invocations that failed.
    pub upstream_failures: u64,
}

/// One request's progress through the states.
struct Transitions {
    state: FilterState,
}

impl Transitions {
    const fn new() -> Self {
        Self {
            state: FilterState::Start,
        }
    }

    fn advance(&mut self, next: FilterState) {
        debug!(from = %self.state, to = %next, "Filter transition");
        self.state = next;
    }
}

/// The single entry point of the ingress pipeline.
#[derive(Clone)]
pub struct GatewayFilter {
    whitelist: Arc<Whitelist>,
    authenticator: Arc<RequestAuthenticator>,
    downstream: Arc<dyn Downstream>,
    interceptor: ResponseInterceptor,
    stats: Arc<FilterStats>,
}

impl GatewayFilter {
    /// Assemble the filter from its collaborators.
    pub fn new(
        whitelist: Whitelist,
        authenticator: RequestAuthenticator,
        downstream: Arc<dyn Downstream>,
        interceptor: ResponseInterceptor,
    ) -> Self {
        Self {
            whitelist: Arc::new(whitelist),
            authenticator: Arc::new(authenticator),
            downstream,
            interceptor,
            stats: Arc::new(FilterStats::default()),
        }
    }

    /// Live request counters.
    #[must_use]
    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// Run one request through the pipeline.
    pub async fn handle(&self, ctx: RequestContext, body: Body) -> Response<Body> {
        let span = gateway_telemetry::ingress_span!(ctx.id(), ctx.method(), ctx.path());
        let (response, _) = self.run(ctx, body).instrument(span).await;
        response
    }

    /// Returns the response and the terminal state reached.
    async fn run(&self, ctx: RequestContext, body: Body) -> (Response<Body>, FilterState) {
        let mut transitions = Transitions::new();
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        info!(
            request_id = %ctx.id(),
            method = %ctx.method(),
            path = %ctx.path(),
            query = ctx.query().unwrap_or_default(),
            source = %ctx.remote_address(),
            local = ?ctx.local_address(),
            cookies = ?ctx.cookie_names(),
            "Incoming request"
        );

        if let Err(rejection) = self.whitelist.check(ctx.remote_address()) {
            warn!(
                reason = rejection.reason(),
                source = %ctx.remote_address(),
                "Request refused by whitelist"
            );
            return self.forbidden(transitions, rejection.into());
        }
        transitions.advance(FilterState::WhitelistChecked);

        let headers = ctx.auth_headers();
        let body_for_signing = headers.body.as_deref().unwrap_or_default();
        let principal = match self
            .authenticator
            .authenticate(&headers, body_for_signing)
            .await
        {
            Ok(principal) => principal,
            Err(rejection) => {
                warn!(
                    reason = rejection.reason(),
                    access_key = headers.access_key.as_deref().unwrap_or_default(),
                    "Request refused by authenticator"
                );
                return self.forbidden(transitions, rejection.into());
            }
        };
        transitions.advance(FilterState::Authenticated);
        debug!(access_key = principal.access_key(), "Request authenticated");

        let response = match self.downstream.invoke(&ctx, request_stream(body)).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Downstream invocation failed");
                let response = ServerError::upstream(e.to_string()).into_response();
                return self.upstream_failed(transitions, response);
            }
        };

        // A success response without a chunked body is answered 500 by the interceptor.
        let unusable =
            response.status == self.interceptor.success_status() && !response.body.is_chunked();
        if unusable {
            let response = self.interceptor.intercept(ctx.id(), response);
            return self.upstream_failed(transitions, response);
        }

        self.stats.invoked.fetch_add(1, Ordering::Relaxed);
        transitions.advance(FilterState::Invoked);

        let response = self.interceptor.intercept(ctx.id(), response);
        transitions.advance(FilterState::ResponseIntercepted);

        transitions.advance(FilterState::Done);
        (response, transitions.state)
    }

    fn forbidden(
        &self,
        mut transitions: Transitions,
        rejection: SecurityError,
    ) -> (Response<Body>, FilterState) {
        self.stats.forbidden.fetch_add(1, Ordering::Relaxed);
        transitions.advance(FilterState::Error);
        (ServerError::from(rejection).into_response(), transitions.state)
    }

    fn upstream_failed(
        &self,
        mut transitions: Transitions,
        response: Response<Body>,
    ) -> (Response<Body>, FilterState) {
        self.stats.upstream_failures.fetch_add(1, Ordering::Relaxed);
        transitions.advance(FilterState::Error);
        (response, transitions.state)
    }
}

impl fmt::Debug for GatewayFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayFilter")
            .field("whitelist", &self.whitelist)
            .field("authenticator", &self.authenticator)
            .field("interceptor", &self.interceptor)
            .finish_non_exhaustive()
    }
}

fn request_stream(body: Body) -> ChunkStream {
    body.into_data_stream()
        .map_err(|e| Box::new(e) as BoxError)
        .boxed()
}
