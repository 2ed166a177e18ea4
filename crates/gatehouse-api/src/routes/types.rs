//! Request/Response DTOs

use serde::{Deserialize, Serialize};

// ==================== Session Types ====================

/// Sign-in request
#[derive(Deserialize)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

/// Sign-in response
#[derive(Serialize)]
pub struct SignInResponse {
    pub username: String,
    pub token: String,
}

// ==================== User Types ====================

/// Create user request
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Create user response
#[derive(Serialize)]
pub struct CreateUserResponse {
    pub user_id: String,
}

/// Update user request
#[derive(Deserialize, Default)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// User response (without password hash)
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub superuser: bool,
    pub created_at: String,
    pub updated_at: String,
}
