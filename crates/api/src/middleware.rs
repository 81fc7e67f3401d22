use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use reclaim_auth::CallerResolver;
use reclaim_infra::continuation::ForwardedAuth;

use crate::app::errors::json_error;
use crate::context::CallerContext;

#[derive(Clone)]
pub struct AuthState {
    pub resolver: CallerResolver,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let (header, token) = extract_bearer(req.headers())
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;

    let caller = state.resolver.resolve(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        json_error(StatusCode::UNAUTHORIZED, "Unauthorized")
    })?;

    let ctx = CallerContext::new(caller, ForwardedAuth::new(header));
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Returns the raw header value and the token inside it.
///
/// A `Bearer ` prefix is optional.
fn extract_bearer(headers: &HeaderMap) -> Option<(&str, &str)> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;

    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        return None;
    }

    Some((header, token))
}
