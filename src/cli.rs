//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, UserRole};
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "flightdesk",
    about = "Cookie-carried session server with rotating refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "4000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "flightdesk.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer using REFRESH_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Set the Secure flag on session cookies (enable behind HTTPS)
    #[arg(long, env = "SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Browser origin allowed to call the API with credentials (e.g. "http://localhost:3000")
    #[arg(long, env = "ALLOWED_ORIGIN")]
    pub allowed_origin: Option<String>,

    /// Trust X-Forwarded-For for the client IP (only behind a reverse proxy)
    #[arg(long)]
    pub trust_proxy: bool,

    /// Login and register attempts allowed per minute per client IP
    #[arg(long, default_value = "10")]
    pub login_rate_limit: u32,

    /// Give the admin role to the user with this email on startup
    #[arg(long)]
    pub grant_admin: Option<String>,

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

/// Load a signing secret from environment variable `env_var` or from `file`.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, file: Option<&str>, file_flag: &str) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: called from `main` before the tokio runtime is built, so
        // no other thread can be reading the environment.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read {} file", env_var);
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or use {}",
            env_var, file_flag
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both signing secrets. They must differ.
pub fn load_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_secret(
        "JWT_SECRET",
        args.jwt_secret_file.as_deref(),
        "--jwt-secret-file",
    )?;
    let refresh = load_secret(
        "REFRESH_SECRET",
        args.refresh_secret_file.as_deref(),
        "--refresh-secret-file",
    )?;

    if access == refresh {
        error!("JWT_SECRET and REFRESH_SECRET must be different");
        return None;
    }

    Some((access, refresh))
}

/// Parse and validate the allowed origin.
/// Returns None and logs an error if validation fails.
pub fn validate_origin(origin: &str) -> Option<Url> {
    let url = match Url::parse(origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %origin, error = %e, "Invalid allowed-origin URL");
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        error!(origin = %origin, "allowed-origin must be an http or https URL");
        return None;
    }

    if url.path() != "/" || url.query().is_some() {
        warn!(origin = %origin, "allowed-origin path and query are ignored");
    }

    Some(url)
}

/// Handle the --grant-admin flag.
pub async fn handle_grant_admin(db: &Database, email: &str) {
    match db.users().set_role_by_email(email, UserRole::Admin).await {
        Ok(true) => info!(email = %email, "Granted admin role"),
        Ok(false) => {
            error!(email = %email, "No user with this email");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Failed to grant admin role");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    jwt_secret: String,
    refresh_secret: String,
    allowed_origin: Option<Url>,
) -> ServerConfig {
    if !args.secure_cookies {
        warn!("Session cookies are sent without the Secure flag");
    }

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        secure_cookies: args.secure_cookies,
        allowed_origin,
        rate_limit: Arc::new(RateLimitConfig::new(
            args.login_rate_limit,
            args.trust_proxy,
        )),
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
