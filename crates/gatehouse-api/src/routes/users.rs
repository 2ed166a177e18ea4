//! Account routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{post, put},
};
use gatehouse_auth::{AuthIdentity, hash_password};
use gatehouse_db::{NewUser, UpdateUser};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{CreateUserRequest, CreateUserResponse, UpdateUserRequest, UserResponse};

// ==================== Input Validation ====================

/// Maximum allowed username length
const MAX_USERNAME_LENGTH: usize = 64;
/// Maximum allowed password length (prevent DoS with very large passwords)
const MAX_PASSWORD_LENGTH: usize = 256;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Validate username format and length
fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username cannot be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Username exceeds maximum length of {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    // Only allow alphanumeric characters, underscores, and hyphens
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::BadRequest(
            "Username can only contain alphanumeric characters, underscores, and hyphens"
                .to_string(),
        ));
    }
    Ok(())
}

/// Validate password length
fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

// ==================== User Routes ====================

/// POST /api/v1/users (open signup, exempt from the interceptor)
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    validate_username(&request.username)?;
    validate_password(&request.password)?;

    debug!("Creating user: {}", request.username);

    let password_hash = hash_password(&request.password)?;

    let user = state
        .db
        .insert_user(NewUser {
            username: request.username,
            email: request.email,
            password_hash,
            superuser: false,
        })
        .await?;

    info!("Created user: {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse { user_id: user.id }),
    ))
}

/// PUT /api/v1/users/me
async fn update_current_user(
    Extension(identity): Extension<AuthIdentity>,
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if request.username.is_none() && request.email.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    if let Some(username) = &request.username {
        validate_username(username)?;
    }

    debug!("Updating user: {}", identity.user_id);

    let user = state
        .db
        .update_user(
            &identity.user_id,
            UpdateUser {
                username: request.username,
                email: request.email,
            },
        )
        .await?;

    info!("Updated user: {}", user.username);

    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        superuser: user.superuser,
        created_at: user.created_at.to_rfc3339(),
        updated_at: user.updated_at.to_rfc3339(),
    }))
}

/// DELETE /api/v1/users/me
async fn delete_current_user(
    Extension(identity): Extension<AuthIdentity>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    debug!("Deleting user: {}", identity.user_id);

    let deleted = state.db.soft_delete_user(&identity.user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("User: {}", identity.user_id)));
    }

    // The account is gone; its session goes with it.
    let auth_header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    state.auth.invalidate_session(auth_header).await?;

    info!("Deleted user: {}", identity.user_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Create account routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/users", post(create_user))
        .route(
            "/api/v1/users/me",
            put(update_current_user).delete(delete_current_user),
        )
}
