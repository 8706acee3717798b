use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::{error::AppError, state::AppState};

/// Source address of the current request, attached for handlers and the
/// audit trail once the rate-limit gate has passed.
#[derive(Clone, Debug)]
pub struct SourceAddr(pub String);

/// Extracts the real IP address from the request extensions.
fn extract_real_ip(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Counts the request against a fixed per-minute window for its source
/// address; exhausted ceilings answer with a distinct 429.
async fn enforce(
    state: AppState,
    scope: &'static str,
    limit: u32,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ip = extract_real_ip(&req);
    let key = format!("rate_limit:{scope}:{ip}");

    if let Err(retry_secs) = state.limiter.check(&key, limit, state.now()) {
        return AppError::RateLimitExceeded(format!(
            "{scope} limit exceeded. Try again in {retry_secs} seconds"
        ))
        .into_response();
    }

    req.extensions_mut().insert(SourceAddr(ip));
    next.run(req).await
}

/// Rate limit for device authentication (default 10/minute per source).
pub async fn rate_limit_authenticate(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let limit = state.config.authenticate_rate_per_minute;
    enforce(state, "authenticate", limit, req, next).await
}

/// Rate limit for stream-info lookups (default 30/minute per source).
pub async fn rate_limit_stream_info(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let limit = state.config.stream_info_rate_per_minute;
    enforce(state, "stream_info", limit, req, next).await
}

/// Rate limit shared by token issuance/revocation and the admin API
/// (default 5/minute per source).
pub async fn rate_limit_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let limit = state.config.admin_rate_per_minute;
    enforce(state, "admin", limit, req, next).await
}
