use async_trait::async_trait;
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::ClientError;
use super::request::{ApiRequest, ApiResponse};

/// Sends one request and returns whatever the server answered.
/// Implementations never interpret status codes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;
}

/// [`Transport`] over HTTP with a cookie jar holding the session cookies.
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    /// `base` is the API root, e.g. `http://localhost:4000/api`.
    /// `timeout` applies to every call, the refresh call included.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, ClientError> {
        Self::with_jar(base, Arc::new(Jar::default()), timeout)
    }

    pub fn with_jar(mut base: Url, jar: Arc<Jar>, timeout: Duration) -> Result<Self, ClientError> {
        if base.cannot_be_a_base() {
            return Err(ClientError::ValidationFailure(format!(
                "{} cannot be used as an API base",
                base
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base })
    }

    pub fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::ValidationFailure(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = self.url_for(&request.path)?;
        debug!(method = %request.method, url = %url, kind = ?request.kind, "Sending request");

        let mut builder = self.client.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        Ok(ApiResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_keeps_base_path() {
        let transport = HttpTransport::new(
            Url::parse("http://localhost:4000/api").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            transport.url_for("/auth/refresh").unwrap().as_str(),
            "http://localhost:4000/api/auth/refresh"
        );
        assert_eq!(
            transport.url_for("me").unwrap().as_str(),
            "http://localhost:4000/api/me"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        let result = HttpTransport::new(
            Url::parse("mailto:pilot@example.com").unwrap(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(ClientError::ValidationFailure(_))));
    }
}
