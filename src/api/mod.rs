mod auth;
mod error;
mod me;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::auth::{AuthState, request_gate};
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt};

/// Create the API router.
///
/// `/auth/*` is public. Everything in `protected` (plus `/me`) sits behind
/// the request gate, so handlers there can rely on [`crate::auth::CurrentPrincipal`].
pub fn create_api_router(
    auth_state: AuthState,
    rate_limit: Arc<RateLimitConfig>,
    protected: Router,
) -> Router {
    let protected = me::router(auth_state.issuer.db().clone())
        .merge(protected)
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            request_gate,
        ));

    Router::new()
        .nest("/auth", auth::router(auth_state, rate_limit))
        .merge(protected)
}
