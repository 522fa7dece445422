//! Error responses for the session endpoints.
//!
//! Every failure is rendered as `{"error": message}`, plus a `details`
//! object for validation failures that can name the offending fields.
//! Internal failures are logged where they happen and reach the caller only
//! as a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
pub enum ApiError {
    /// 400: the request body is missing or malformed fields.
    ValidationFailure {
        message: String,
        details: Option<Value>,
    },
    /// 401: no credentials, wrong credentials, or a session that is gone.
    Unauthenticated(&'static str),
    /// 500: storage, hashing or token minting failed.
    Internal,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
            details: None,
        }
    }

    /// Attach per-field details to a validation failure. Other kinds are
    /// returned unchanged.
    pub fn with_details(self, details: Value) -> Self {
        match self {
            Self::ValidationFailure { message, .. } => Self::ValidationFailure {
                message,
                details: Some(details),
            },
            other => other,
        }
    }

    pub fn unauthenticated(message: &'static str) -> Self {
        Self::Unauthenticated(message)
    }

    /// Log `e` under `context` and hide it behind a 500.
    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!(error = %e, "{}", context);
        Self::Internal
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ValidationFailure { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Maps any displayable error into [`ApiError::Internal`], logging it.
pub trait ResultExt<T> {
    fn or_internal(self, context: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn or_internal(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal(context, e))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::ValidationFailure { message, details } => ErrorBody {
                error: message,
                details,
            },
            Self::Unauthenticated(message) => ErrorBody {
                error: message.to_string(),
                details: None,
            },
            Self::Internal => ErrorBody {
                error: INTERNAL_MESSAGE.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
