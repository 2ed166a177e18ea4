//! Gatehouse - session-backed user account service

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::Config;
use gatehouse_api::{AppState, create_router};
use gatehouse_auth::{Authenticator, InMemorySessionStore, TokenCodec};
use gatehouse_db::Database;

/// Gatehouse - session-backed user account service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "GATEHOUSE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "GATEHOUSE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging.level);

    info!("Starting Gatehouse v{}", env!("CARGO_PKG_VERSION"));

    if config.auth.secret == config::DEFAULT_SECRET {
        warn!("auth.secret is the built-in default; set a real secret before exposing this service");
    }

    // Initialize database
    if let Some(parent) = Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db_url = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_url).await?;

    // Create default superuser if no users exist
    if !db.has_users().await? {
        info!("Creating default admin user");
        let password_hash = gatehouse_auth::hash_password("admin")?;
        db.insert_user(gatehouse_db::NewUser {
            username: "admin".to_string(),
            email: "admin@localhost".to_string(),
            password_hash,
            superuser: true,
        })
        .await?;
        info!("Default admin user created (username: admin, password: admin)");
    }

    // The registry TTL and the token lifetime are one value: a token
    // never outlives its session, nor the session its tokens.
    let lifetime_hours = config.auth.token_lifetime_hours;
    let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(
        lifetime_hours.unsigned_abs() * 3600,
    )));
    let codec = TokenCodec::new(&config.auth.secret, lifetime_hours);

    // The one authentication authority, shared by every handler
    let authenticator = Arc::new(Authenticator::new(
        Arc::new(db.clone()),
        sessions.clone(),
        codec,
    ));

    // Periodic sweep of expired sessions
    let sweep_interval = Duration::from_secs(config.auth.sweep_interval_secs.max(1));
    let sweep_store = sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = sweep_store.purge_expired();
            if purged > 0 {
                info!("Purged {} expired sessions", purged);
            }
        }
    });

    // Create application state
    let state = AppState::new(db, authenticator);

    // Create router
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}
