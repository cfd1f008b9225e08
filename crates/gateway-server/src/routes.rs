//! Route definitions.
//!
//! The gateway owns no paths of its own: every method and path goes through
//! the ingress filter.

use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    response::Response,
    Router,
};
use gateway_core::{RequestContext, RequestId};
use std::net::SocketAddr;

/// Header carrying a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const MAX_REQUEST_ID_LEN: usize = 128;

/// Create the gateway router
pub fn create_router(state: AppState) -> Router {
    Router::new().fallback(ingress).with_state(state)
}

async fn ingress(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();

    let forwarded_for = parts
        .headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok());
    let client_ip = state
        .trusted_proxies
        .get_client_ip(forwarded_for, peer.ip());

    let mut ctx =
        RequestContext::new(parts.method, parts.uri, parts.headers, client_ip.to_string());
    if let Some(id) = caller_request_id(&ctx) {
        ctx = ctx.with_id(id);
    }
    if let Some(local) = state.local_address {
        ctx = ctx.with_local_address(local);
    }

    state.filter.handle(ctx, body).await
}

fn caller_request_id(ctx: &RequestContext) -> Option<RequestId> {
    ctx.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(RequestId::new)
}
