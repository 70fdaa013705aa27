//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::cleanup::DEFAULT_CLEANUP_INTERVAL;
use crate::db::{Database, ROLE_ADMIN};
use crate::error::AuthError;
use crate::jwt::JwtSettings;
use crate::password::{hash_password, validate_new_password};
use chrono::TimeDelta;
use clap::Parser;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::time::Duration;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Length of generated admin passwords.
const GENERATED_PASSWORD_LENGTH: usize = 24;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokengate",
    about = "Bearer token issuance, validation and revocation service"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE", default_value = "tokengate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Value of the `iss` claim, checked on every token
    #[arg(long, env = "TOKEN_ISSUER", default_value = "tokengate")]
    pub token_issuer: String,

    /// Value of the `aud` claim, checked on every token
    #[arg(long, env = "TOKEN_AUDIENCE", default_value = "tokengate-api")]
    pub token_audience: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = 300)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = 14 * 24 * 60 * 60)]
    pub refresh_token_ttl: u64,

    /// `tokenType` claim value of access tokens
    #[arg(long, env = "ACCESS_TOKEN_TYPE", default_value = "access")]
    pub access_token_type: String,

    /// `tokenType` claim value of refresh tokens
    #[arg(long, env = "REFRESH_TOKEN_TYPE", default_value = "refresh")]
    pub refresh_token_type: String,

    /// Seconds between sweeps of expired and revoked tokens
    #[arg(long, env = "CLEANUP_INTERVAL", default_value_t = DEFAULT_CLEANUP_INTERVAL.as_secs())]
    pub cleanup_interval: u64,

    /// Create (or promote) an admin user on startup. The password is read from
    /// ADMIN_PASSWORD, or generated and printed once
    #[arg(long, value_name = "USERNAME")]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

fn seconds(value: u64, what: &str) -> Result<TimeDelta, AuthError> {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| AuthError::configuration(format!("{} is out of range", what)))
}

/// Build the token settings from the parsed arguments.
pub fn jwt_settings(args: &Args) -> Result<JwtSettings, AuthError> {
    let settings = JwtSettings {
        issuer: args.token_issuer.clone(),
        audience: args.token_audience.clone(),
        access_ttl: seconds(args.access_token_ttl, "access token lifetime")?,
        refresh_ttl: seconds(args.refresh_token_ttl, "refresh token lifetime")?,
        access_type: args.access_token_type.clone(),
        refresh_type: args.refresh_token_type.clone(),
    };
    settings.validate()?;
    Ok(settings)
}

/// Generate a random alphanumeric password.
fn generate_password() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Handle the --create-admin flag: create the admin, or grant the admin role
/// to an existing user of that name.
pub async fn handle_create_admin(db: &Database, username: &str) {
    let users = db.users();

    match users.get_by_username(username).await {
        Ok(Some(existing)) => match users.add_role(&existing.username, ROLE_ADMIN).await {
            Ok(_) => {
                println!();
                println!("User already exists: {}", existing.username);
                println!("Admin role granted");
                println!();
            }
            Err(e) => {
                error!(error = %e, "Failed to grant admin role");
                std::process::exit(1);
            }
        },
        Ok(None) => {
            let (password, generated) = match std::env::var("ADMIN_PASSWORD") {
                Ok(password) => {
                    // SAFETY: still single-threaded startup, see load_jwt_secret.
                    unsafe { std::env::remove_var("ADMIN_PASSWORD") };
                    (password, false)
                }
                Err(_) => (generate_password(), true),
            };

            if let Err(msg) = validate_new_password(&password) {
                error!("ADMIN_PASSWORD rejected: {}", msg);
                std::process::exit(1);
            }

            let hash = match hash_password(&password) {
                Ok(hash) => hash,
                Err(e) => {
                    error!(error = %e, "Failed to hash admin password");
                    std::process::exit(1);
                }
            };

            let email = format!("{}@localhost", username);
            match users.create(username, &email, &hash, ROLE_ADMIN).await {
                Ok(_) => {
                    println!();
                    println!("Admin user created: {}", username);
                    if generated {
                        println!("Password: {}", password);
                    }
                    println!();
                }
                Err(e) => {
                    error!(error = %e, "Failed to create admin user");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    jwt_secret: String,
    jwt_settings: JwtSettings,
    cleanup_interval: u64,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        jwt_settings,
        cleanup_interval: Duration::from_secs(cleanup_interval.max(1)),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
