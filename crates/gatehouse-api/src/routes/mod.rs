//! API routes

mod health;
mod session;
mod types;
mod users;

use axum::{Router, middleware};

use crate::interceptor::access_interceptor;
use crate::state::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // Account and session routes sit behind the access interceptor; the
    // health probes do not.
    let api = Router::new()
        .merge(session::routes())
        .merge(users::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access_interceptor,
        ));

    Router::new()
        .merge(health::routes())
        .merge(api)
        .with_state(state)
}
