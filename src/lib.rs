pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod client;
pub mod db;
pub mod issuer;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use api::create_api_router;
use auth::{AuthState, CookieSettings};
use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use db::Database;
use issuer::TokenIssuer;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use url::Url;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub jwt_secret: Vec<u8>,
    /// Secret for signing refresh tokens
    pub refresh_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Browser origin allowed to make credentialed cross-origin requests
    pub allowed_origin: Option<Url>,
    /// Per-IP limiter for login and register, shared with the cleanup task
    pub rate_limit: Arc<RateLimitConfig>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    create_app_with_protected(config, Router::new())
}

/// Like [`create_app`], with extra routes mounted under `/api` behind the
/// request gate.
pub fn create_app_with_protected(config: &ServerConfig, protected: Router) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret, &config.refresh_secret));
    let auth_state = AuthState {
        issuer: Arc::new(TokenIssuer::new(jwt, config.db.clone())),
        cookies: CookieSettings {
            secure: config.secure_cookies,
        },
    };
    let router = Router::new()
        .route("/health", get(health))
        .nest(
            "/api",
            create_api_router(auth_state, config.rate_limit.clone(), protected),
        )
        .layer(TraceLayer::new_for_http());

    match config.allowed_origin.as_ref().and_then(cors_layer) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(origin: &Url) -> Option<CorsLayer> {
    let origin = origin.origin().ascii_serialization();
    let Ok(value) = HeaderValue::from_str(&origin) else {
        warn!(origin = %origin, "Allowed origin is not a valid header value, CORS disabled");
        return None;
    };

    Some(
        CorsLayer::new()
            .allow_origin(value)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(config: &ServerConfig) {
    cleanup::run_cleanup(&config.db, &config.rate_limit).await;
    cleanup::spawn_cleanup_scheduler(config.db.clone(), config.rate_limit.clone());
}

/// Serve `app` on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(app: Router, listener: TcpListener) -> Result<(), std::io::Error> {
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config).await;
    let app = create_app(&config);

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        run_server(app, listener).await.ok();
    });

    Ok((handle, local_addr))
}
