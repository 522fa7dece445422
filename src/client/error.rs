/// Errors surfaced to callers of the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The request was replayed after a refresh and still rejected.
    #[error("not authenticated")]
    Unauthenticated,
    /// The refresh call itself was rejected.
    #[error("session could not be refreshed")]
    Unauthorized,
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("invalid request: {0}")]
    ValidationFailure(String),
    #[error("{message}")]
    Status { status: u16, message: String },
    /// The caller driving the refresh went away before it finished.
    #[error("refresh abandoned before completion")]
    RefreshAbandoned,
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether this error means the session is gone and the user must sign in again.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthenticated | ClientError::Unauthorized | ClientError::RefreshAbandoned
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            ClientError::ValidationFailure(e.to_string())
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::NetworkFailure(e.to_string())
        }
    }
}
