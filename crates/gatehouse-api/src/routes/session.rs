//! Sign-in and sign-out routes

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::post,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{SignInRequest, SignInResponse};

/// Maximum allowed password length (prevent DoS with very large passwords)
const MAX_PASSWORD_LENGTH: usize = 256;

/// POST /api/v1/session
async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    if request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }

    debug!("Sign-in attempt for user: {}", request.username);

    let outcome = state
        .auth
        .authenticate(&request.username, &request.password)
        .await?;
    let token = state.auth.encode_token(&outcome)?;

    info!("User {} signed in", outcome.user.username);

    Ok(Json(SignInResponse {
        username: outcome.user.username,
        token,
    }))
}

/// DELETE /api/v1/session
async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let auth_header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    state.auth.invalidate_session(auth_header).await?;

    debug!("Session invalidated");

    Ok(StatusCode::NO_CONTENT)
}

/// Create session routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/session", post(sign_in).delete(sign_out))
}
