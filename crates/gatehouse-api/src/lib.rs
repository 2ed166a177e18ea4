//! Gatehouse HTTP API
//!
//! This crate provides the Axum-based API for the account service. Every
//! route except sign-in and account creation sits behind the access
//! interceptor.

pub mod error;
pub mod interceptor;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
