//! Session endpoints. None of these sit behind the request gate.
//!
//! - POST `/register` - Create an account
//! - POST `/login` - Check credentials, issue a session
//! - POST `/refresh` - Rotate the session using the refresh token cookie
//! - POST `/logout` - Revoke the session and clear cookies

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{ACCESS_COOKIE_NAME, AuthState, REFRESH_COOKIE_NAME, get_cookie};
use crate::db::Principal;
use crate::issuer::{RotateError, TokenPair};
use crate::password::{hash_password_blocking, verify_password_blocking};
use crate::rate_limit::{RateLimitConfig, rate_limit_credentials};

const MAX_USERNAME_LEN: usize = 32;

pub fn router(state: AuthState, rate_limit: Arc<RateLimitConfig>) -> Router {
    let credentials = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            rate_limit,
            rate_limit_credentials,
        ));

    Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .with_state(state)
        .merge(credentials)
}

#[derive(Serialize)]
struct UserResponse {
    user: Principal,
}

/// 200 with both session cookies and the principal.
fn session_response(state: &AuthState, tokens: &TokenPair, principal: Principal) -> Response {
    let [access, refresh] = state.cookies.session_cookies(tokens);
    (
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        Json(UserResponse { user: principal }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct RegisteredUser {
    id: i64,
    email: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    message: &'static str,
    user: RegisteredUser,
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    let email = payload.email.trim();

    if username.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation(
            "Username, email and password are required",
        ));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(
            "Username cannot be longer than 32 characters",
        ));
    }

    if !is_plausible_email(email) {
        return Err(ApiError::validation("Invalid email address"));
    }

    let users = state.issuer.db().users();
    let available = users
        .is_email_available(email)
        .await
        .or_internal("Failed to check email availability")?;
    if !available {
        return Err(ApiError::validation("Email is already in use"));
    }

    let password_hash = hash_password_blocking(payload.password)
        .await
        .map_err(|e| ApiError::internal("Failed to hash password", e))?;

    let id = match users.create(username, email, &password_hash).await {
        Ok(id) => id,
        // Lost a race with a concurrent registration for the same email
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::validation("Email is already in use"));
        }
        Err(e) => return Err(ApiError::internal("Failed to create user", e)),
    };

    info!(principal_id = id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered",
            user: RegisteredUser {
                id,
                email: email.to_string(),
            },
        }),
    ))
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = payload.email.trim();

    if email.is_empty() || payload.password.is_empty() {
        return Err(
            ApiError::validation("Email and password are required").with_details(json!({
                "email": email.is_empty(),
                "password": payload.password.is_empty(),
            })),
        );
    }

    let credentials = state
        .issuer
        .db()
        .users()
        .get_credentials_by_email(email)
        .await
        .or_internal("Failed to look up user")?;

    let Some(credentials) = credentials else {
        info!("Login attempt for unknown email");
        return Err(ApiError::unauthenticated("Invalid email or password"));
    };

    if !verify_password_blocking(payload.password, credentials.password_hash).await {
        info!(
            principal_id = credentials.principal.id,
            "Login attempt with wrong password"
        );
        return Err(ApiError::unauthenticated("Invalid email or password"));
    }

    let tokens = state
        .issuer
        .issue(credentials.principal.id)
        .await
        .or_internal("Failed to issue session")?;

    info!(principal_id = credentials.principal.id, "Login successful");
    Ok(session_response(&state, &tokens, credentials.principal))
}

/// Exchange the refresh token cookie for a new pair. Never retried by the gate.
async fn refresh(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let refresh_token = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthenticated("No refresh token"))?;

    match state.issuer.rotate(refresh_token).await {
        Ok(rotation) => {
            info!(principal_id = rotation.principal.id, "Session refreshed");
            Ok(session_response(
                &state,
                &rotation.tokens,
                rotation.principal,
            ))
        }
        Err(e @ (RotateError::Storage(_) | RotateError::Minting(_))) => {
            Err(ApiError::internal("Failed to rotate session", e))
        }
        Err(_) => Err(ApiError::unauthenticated("Invalid refresh token")),
    }
}

#[derive(Serialize)]
struct LogoutResponse {
    message: &'static str,
}

/// Revoke whatever session the cookies identify, then clear them.
/// Succeeds with no cookies at all.
async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let from_access = get_cookie(&headers, ACCESS_COOKIE_NAME)
        .and_then(|token| state.issuer.verify_access(token).ok());

    let principal_id = match from_access {
        Some(id) => Some(id),
        None => match get_cookie(&headers, REFRESH_COOKIE_NAME) {
            Some(token) => state
                .issuer
                .current_refresh_owner(token)
                .await
                .or_internal("Failed to look up session")?,
            None => None,
        },
    };

    match principal_id {
        Some(id) => {
            state
                .issuer
                .revoke(id)
                .await
                .or_internal("Failed to revoke session")?;
            info!(principal_id = id, "Logged out");
        }
        None => warn!("Logout without an identifiable session"),
    }

    let [clear_access, clear_refresh] = state.cookies.cleared_cookies();
    Ok((
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, clear_access), (SET_COOKIE, clear_refresh)]),
        Json(LogoutResponse {
            message: "Logged out",
        }),
    ))
}
