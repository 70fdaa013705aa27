pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod directory;
pub mod error;
pub mod jwt;
pub mod password;

use api::create_api_router;
use axum::Router;
use db::Database;
use error::AuthError;
use jwt::{JwtConfig, JwtSettings};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Symmetric secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Issuer, audience, lifetimes and purpose tags
    pub jwt_settings: JwtSettings,
    /// Interval between sweeps of expired and revoked tokens
    pub cleanup_interval: Duration,
}

/// Create the application router with the given configuration.
///
/// Fails when the token settings are unusable; the server must not start then.
pub fn create_app(config: &ServerConfig) -> Result<Router, AuthError> {
    let jwt = Arc::new(JwtConfig::new(
        &config.jwt_secret,
        config.jwt_settings.clone(),
    )?);

    let api_router = create_api_router(config.db.clone(), jwt);

    Ok(Router::new().nest("/api", api_router))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database, interval: Duration) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone(), interval);
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
///
/// Token settings must already be validated; a failure here is reported as an I/O error.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
