//! Application state

use gatehouse_auth::Authenticator;
use gatehouse_db::Database;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<Authenticator>,
}

impl AppState {
    pub fn new(db: Database, auth: Arc<Authenticator>) -> Self {
        Self { db, auth }
    }
}
