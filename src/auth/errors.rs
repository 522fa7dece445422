//! Request gate rejections.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why the gate refused a request. Rendered as `{"error": ...}`.
///
/// A rejection never touches the session cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// No access token cookie at all
    NotAuthenticated,
    /// Access token failed signature or type checks
    InvalidToken,
    /// Access token expired and the refresh token could not be rotated
    SessionExpired,
    /// Storage failed while rotating
    Internal,
}

impl GateError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated | Self::InvalidToken | Self::SessionExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Authentication required",
            Self::InvalidToken => "Invalid token",
            Self::SessionExpired => "Session expired",
            Self::Internal => "Internal server error",
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
