use reqwest::{Method, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use super::error::ClientError;

/// How the coordinator treats a 401 on this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Carries the session; a 401 triggers a refresh and one replay.
    Session,
    /// The refresh call. A 401 is terminal.
    Refresh,
    /// Does not carry a session (login, register). A 401 is returned as is.
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `/me`
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub kind: RequestKind,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            kind: RequestKind::Session,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `POST /auth/refresh`, tagged so it is never refreshed-and-retried.
    pub fn refresh() -> Self {
        Self::post("/auth/refresh").kind(RequestKind::Refresh)
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn kind(mut self, kind: RequestKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptNumber {
    Initial,
    Retry,
}

/// A request on its way out, with how many times it has been sent.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub request: ApiRequest,
    pub number: AttemptNumber,
}

impl Attempt {
    pub fn initial(request: ApiRequest) -> Self {
        Self {
            request,
            number: AttemptNumber::Initial,
        }
    }

    pub fn retry(self) -> Self {
        Self {
            request: self.request,
            number: AttemptNumber::Retry,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// The `{"error": ...}` message of a failed response, if it has one.
    pub fn error_message(&self) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(&self.body)
            .ok()
            .map(|body| body.error)
    }

    pub fn into_error(self) -> ClientError {
        let message = self.error_message().unwrap_or_else(|| {
            self.status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
        ClientError::Status {
            status: self.status.as_u16(),
            message,
        }
    }
}
