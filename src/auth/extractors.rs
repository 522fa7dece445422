//! Axum extractors for authenticated handlers.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::GateError;
use super::gate::AuthenticatedPrincipal;

/// The principal admitted by [`request_gate`](super::request_gate).
///
/// Rejects with 401 when used on a route the gate does not cover.
pub struct CurrentPrincipal(pub AuthenticatedPrincipal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .copied()
            .map(CurrentPrincipal)
            .ok_or(GateError::NotAuthenticated)
    }
}
