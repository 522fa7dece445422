#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use flightdesk::{
    ServerConfig,
    db::Database,
    jwt::{AccessClaims, JwtConfig, RefreshClaims, TokenType},
    password::hash_password,
    rate_limit::RateLimitConfig,
};
use jsonwebtoken::{EncodingKey, Header};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        secure_cookies: false,
        allowed_origin: None,
        rate_limit: Arc::new(RateLimitConfig::new(1000, false)),
    }
}

pub async fn test_db() -> Database {
    Database::open(":memory:")
        .await
        .expect("Failed to open test database")
}

pub fn test_jwt() -> JwtConfig {
    JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET)
}

/// Create a test app and return (app, db).
pub async fn create_test_app() -> (Router, Database) {
    let db = test_db().await;
    (flightdesk::create_app(&test_config(db.clone())), db)
}

/// Create a user whose password is [`PASSWORD`].
pub async fn create_user(db: &Database, username: &str, email: &str) -> i64 {
    let hash = hash_password(PASSWORD).unwrap();
    db.users().create(username, email, &hash).await.unwrap()
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Authentic access token that expired a minute ago.
pub fn expired_access_token(principal_id: i64) -> String {
    let now = now();
    let claims = AccessClaims {
        sub: principal_id.to_string(),
        token_type: TokenType::Access,
        iat: now - 3660,
        exp: now - 60,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(ACCESS_SECRET),
    )
    .unwrap()
}

/// Authentic refresh token that expired a minute ago, with the given jti.
pub fn expired_refresh_token(principal_id: i64, jti: &str) -> String {
    let now = now();
    let claims = RefreshClaims {
        jti: jti.to_string(),
        sub: principal_id.to_string(),
        token_type: TokenType::Refresh,
        iat: now - 3660,
        exp: now - 60,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(REFRESH_SECRET),
    )
    .unwrap()
}

/// Access token with valid claims signed by the wrong key.
pub fn forged_access_token(principal_id: i64) -> String {
    JwtConfig::new(
        b"some-other-access-secret-0123456789",
        b"some-other-refresh-secret-0123456789",
    )
    .generate_access_token(principal_id)
    .unwrap()
    .token
}

/// Build a `Cookie` header value.
pub fn cookie_header(cookies: &[(&str, &str)]) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn with_cookies(method: &str, uri: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie_header(cookies))
        .body(Body::empty())
        .unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of the named cookie in a list of `Set-Cookie` headers.
pub fn cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
    set_cookies.iter().find_map(|cookie| {
        let (pair, _) = cookie.split_once(';').unwrap_or((cookie, ""));
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
