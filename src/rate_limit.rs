//! Rate limiting for credential endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Key used when no client address can be determined (e.g. in-process tests).
const UNKNOWN_CLIENT: &str = "unknown";

/// Rate limiting configuration for login and registration.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login and register
    pub credentials: Arc<IpLimiter>,
    /// Read the client IP from X-Forwarded-For
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// `per_minute` requests per minute per IP, bursting up to the same amount.
    /// Zero is treated as one.
    pub fn new(per_minute: u32, trust_proxy: bool) -> Self {
        let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            credentials: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            trust_proxy,
        }
    }

    /// Forget clients whose bucket has refilled completely. Returns how many
    /// clients are still tracked.
    pub fn prune(&self) -> usize {
        self.credentials.retain_recent();
        self.credentials.shrink_to_fit();
        self.credentials.len()
    }
}

/// Middleware for rate limiting credential endpoints.
pub async fn rate_limit_credentials(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(&request, config.trust_proxy)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    match config.credentials.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Credential endpoint rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many attempts. Please wait before trying again."
                })),
            )
                .into_response()
        }
    }
}
