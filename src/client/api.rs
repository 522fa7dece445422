//! Typed calls against the `/api` surface.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use std::sync::Arc;

use super::coordinator::RefreshCoordinator;
use super::error::ClientError;
use super::request::{ApiRequest, ApiResponse, RequestKind};
use crate::db::Principal;

#[derive(Deserialize)]
struct UserEnvelope {
    user: Principal,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub email: String,
}

#[derive(Deserialize)]
struct RegisterEnvelope {
    user: RegisteredUser,
}

#[derive(Clone)]
pub struct ApiClient {
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send any request through the coordinator.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.coordinator.execute(request).await
    }

    /// Send `request` and decode a successful body; other statuses become
    /// [`ClientError::Status`].
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        let response = self.execute(request).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        response.json()
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisteredUser, ClientError> {
        let request = ApiRequest::post("/auth/register")
            .kind(RequestKind::Anonymous)
            .json(json!({ "username": username, "email": email, "password": password }));
        let envelope: RegisterEnvelope = self.fetch_json(request).await?;
        Ok(envelope.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Principal, ClientError> {
        let request = ApiRequest::post("/auth/login")
            .kind(RequestKind::Anonymous)
            .json(json!({ "email": email, "password": password }));
        let envelope: UserEnvelope = self.fetch_json(request).await?;
        Ok(envelope.user)
    }

    /// Rotate the session explicitly, sharing any refresh already in flight.
    /// A 401 is [`ClientError::Unauthorized`].
    pub async fn refresh(&self) -> Result<Principal, ClientError> {
        let envelope: UserEnvelope = self.coordinator.refresh_session().await?.json()?;
        Ok(envelope.user)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let response = self
            .execute(ApiRequest::post("/auth/logout").kind(RequestKind::Anonymous))
            .await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        Ok(())
    }

    pub async fn me(&self) -> Result<Principal, ClientError> {
        let envelope: UserEnvelope = self.fetch_json(ApiRequest::get("/me")).await?;
        Ok(envelope.user)
    }
}
