//! Access interceptor
//!
//! The per-call gate in front of every API route: either the method is on
//! the fixed exempt list, or the caller must present a bearer token that
//! verifies against a live session.

use axum::{
    extract::{Request, State},
    http::{Method, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Methods callable without a verified identity: the two that establish
/// one. Fixed at build time, not runtime-configurable.
const EXEMPT_METHODS: &[(&str, &str)] = &[
    ("POST", "/api/v1/session"),
    ("POST", "/api/v1/users"),
];

fn is_exempt(method: &Method, path: &str) -> bool {
    EXEMPT_METHODS
        .iter()
        .any(|(m, p)| method.as_str() == *m && path == *p)
}

/// Interceptor middleware applied to the whole API router.
///
/// On success the verified `AuthIdentity` is inserted into request
/// extensions; handlers learn who is calling exclusively from there.
pub async fn access_interceptor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_exempt(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let identity = state.auth.verify_credentials(auth_header).await?;

    debug!("Authenticated user: {}", identity.username);

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
