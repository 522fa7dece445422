//! Request gate for protected routes.
//!
//! A valid access token is enough on its own. An expired one is exchanged for
//! a new pair through the refresh token inside the same call, and the new
//! cookies ride on the handler's response. Forged or malformed access tokens
//! never reach the refresh path.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, info};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie};
use super::errors::GateError;
use super::state::AuthState;
use crate::issuer::{AccessError, RotateError, TokenPair};

/// Identity attached to the request by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub id: i64,
    /// The access token had expired and was rotated during this call
    pub refreshed: bool,
}

/// Result of checking one request's cookies.
#[derive(Debug)]
pub struct Admission {
    pub principal: AuthenticatedPrincipal,
    /// New pair to send back when the gate rotated
    pub rotated: Option<TokenPair>,
}

/// Decide whether a request may proceed, rotating the session if needed.
pub async fn admit(state: &AuthState, headers: &HeaderMap) -> Result<Admission, GateError> {
    let access_token =
        get_cookie(headers, ACCESS_COOKIE_NAME).ok_or(GateError::NotAuthenticated)?;

    match state.issuer.verify_access(access_token) {
        Ok(id) => Ok(Admission {
            principal: AuthenticatedPrincipal {
                id,
                refreshed: false,
            },
            rotated: None,
        }),
        Err(AccessError::Invalid) => {
            debug!("Rejected invalid access token");
            Err(GateError::InvalidToken)
        }
        Err(AccessError::Expired) => {
            let refresh_token =
                get_cookie(headers, REFRESH_COOKIE_NAME).ok_or(GateError::SessionExpired)?;

            let rotation = state
                .issuer
                .rotate(refresh_token)
                .await
                .map_err(|e| match e {
                    RotateError::Storage(_) | RotateError::Minting(_) => GateError::Internal,
                    _ => GateError::SessionExpired,
                })?;

            info!(principal_id = rotation.principal.id, "Session rotated by gate");
            Ok(Admission {
                principal: AuthenticatedPrincipal {
                    id: rotation.principal.id,
                    refreshed: true,
                },
                rotated: Some(rotation.tokens),
            })
        }
    }
}

/// Middleware guarding protected routes. Layer with
/// `middleware::from_fn_with_state(auth_state, request_gate)`.
pub async fn request_gate(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let admission = admit(&state, request.headers()).await?;
    request.extensions_mut().insert(admission.principal);

    let mut response = next.run(request).await;

    // Sent even when the handler failed; the old refresh token is already spent.
    if let Some(tokens) = admission.rotated {
        state
            .cookies
            .append_session_cookies(response.headers_mut(), &tokens);
    }

    Ok(response)
}
