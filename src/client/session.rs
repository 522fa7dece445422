//! Client-side view of who is signed in.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::api::ApiClient;
use super::coordinator::{AuthFailureSink, RefreshCoordinator};
use super::error::ClientError;
use super::transport::Transport;
use crate::db::Principal;

pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please sign in again.";

/// Where the UI should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Login,
    App,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub principal: Option<Principal>,
    /// Set once the initial session check has finished.
    pub initialized: bool,
    /// Message to show the user, if any.
    pub notice: Option<String>,
    pub route: Route,
}

/// Observable session state. Subscribers see every change.
pub struct SessionStore {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    fn update(&self, f: impl FnOnce(&mut SessionState)) {
        self.tx.send_modify(f);
    }

    /// Session-ending errors sign the user out; anything else only sets the notice.
    pub fn handle_auth_error(&self, error: &ClientError) {
        if error.is_auth_failure() {
            info!(error = %error, "Session ended");
            self.update(|state| {
                state.principal = None;
                state.notice = Some(SESSION_EXPIRED_NOTICE.to_string());
                state.route = Route::Login;
            });
        } else {
            self.update(|state| state.notice = Some(error.to_string()));
        }
    }
}

impl AuthFailureSink for SessionStore {
    fn on_auth_failure(&self, error: &ClientError) {
        self.handle_auth_error(error);
    }
}

pub struct SessionHolder {
    api: ApiClient,
    store: Arc<SessionStore>,
}

impl SessionHolder {
    /// A holder whose coordinator reports refresh failures to its own store.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let store = Arc::new(SessionStore::new());
        let coordinator = RefreshCoordinator::new(transport).with_failure_sink(store.clone());
        Self {
            api: ApiClient::new(Arc::new(coordinator)),
            store,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn state(&self) -> SessionState {
        self.store.snapshot()
    }

    /// Initial session check. Skipped on the login route.
    pub async fn mount(&self, current: Route) {
        if current == Route::Login {
            self.store.update(|state| {
                state.initialized = true;
                state.route = Route::Login;
            });
            return;
        }

        match self.api.refresh().await {
            Ok(principal) => self.store.update(|state| {
                state.principal = Some(principal);
                state.initialized = true;
                state.route = current;
            }),
            Err(e) => {
                info!(error = %e, "No active session");
                self.store.update(|state| {
                    state.principal = None;
                    state.initialized = true;
                    state.notice = None;
                    state.route = Route::Login;
                });
            }
        }
    }

    /// Record a principal returned by a successful login.
    pub fn login(&self, principal: Principal) {
        self.store.update(|state| {
            state.principal = Some(principal);
            state.initialized = true;
            state.notice = None;
            state.route = Route::App;
        });
    }

    /// Log in with credentials. A failure is shown as the notice.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, ClientError> {
        match self.api.login(email, password).await {
            Ok(principal) => {
                self.login(principal.clone());
                Ok(principal)
            }
            Err(e) => {
                self.store
                    .update(|state| state.notice = Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Clears local state whether or not the server call succeeds.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Logout request failed");
        }

        self.store.update(|state| {
            state.principal = None;
            state.notice = None;
            state.route = Route::Login;
        });
    }

    pub fn handle_auth_error(&self, error: &ClientError) {
        self.store.handle_auth_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiRequest, ApiResponse};
    use crate::db::UserRole;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers by path; unknown paths get 404. Records every path sent.
    #[derive(Default)]
    struct StubTransport {
        routes: HashMap<&'static str, (StatusCode, String)>,
        sent: Mutex<Vec<String>>,
    }

    impl StubTransport {
        fn route(mut self, path: &'static str, status: StatusCode, body: String) -> Self {
            self.routes.insert(path, (status, body));
            self
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
            self.sent.lock().unwrap().push(request.path.clone());
            match self.routes.get(request.path.as_str()) {
                Some((status, body)) => Ok(ApiResponse::new(*status, body.clone())),
                None => Ok(ApiResponse::new(StatusCode::NOT_FOUND, Vec::new())),
            }
        }
    }

    fn pilot() -> Principal {
        Principal {
            id: 7,
            username: "pilot".into(),
            email: "pilot@example.com".into(),
            role: UserRole::User,
        }
    }

    fn user_body() -> String {
        serde_json::json!({ "user": pilot() }).to_string()
    }

    fn holder_with(transport: StubTransport) -> (SessionHolder, Arc<StubTransport>) {
        let transport = Arc::new(transport);
        (SessionHolder::new(transport.clone()), transport)
    }

    #[tokio::test]
    async fn test_mount_on_login_route_skips_network() {
        let (holder, transport) = holder_with(StubTransport::default());

        holder.mount(Route::Login).await;

        let state = holder.state();
        assert!(state.initialized);
        assert_eq!(state.principal, None);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mount_restores_session() {
        let (holder, transport) = holder_with(StubTransport::default().route(
            "/auth/refresh",
            StatusCode::OK,
            user_body(),
        ));

        holder.mount(Route::App).await;

        let state = holder.state();
        assert!(state.initialized);
        assert_eq!(state.principal, Some(pilot()));
        assert_eq!(state.route, Route::App);
        assert_eq!(transport.sent(), vec!["/auth/refresh"]);
    }

    #[tokio::test]
    async fn test_mount_without_session_goes_to_login() {
        let (holder, transport) = holder_with(StubTransport::default().route(
            "/auth/refresh",
            StatusCode::UNAUTHORIZED,
            r#"{"error":"No refresh token"}"#.into(),
        ));

        holder.mount(Route::App).await;

        let state = holder.state();
        assert!(state.initialized);
        assert_eq!(state.principal, None);
        assert_eq!(state.route, Route::Login);
        assert_eq!(state.notice, None);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_sets_principal() {
        let (holder, _) = holder_with(StubTransport::default().route(
            "/auth/login",
            StatusCode::OK,
            user_body(),
        ));
        let mut updates = holder.store().subscribe();

        holder.sign_in("pilot@example.com", "pw").await.unwrap();

        assert!(updates.has_changed().unwrap());
        let state = updates.borrow_and_update().clone();
        assert_eq!(state.principal, Some(pilot()));
        assert_eq!(state.route, Route::App);
    }

    #[tokio::test]
    async fn test_sign_in_failure_sets_notice_without_refresh() {
        let (holder, transport) = holder_with(StubTransport::default().route(
            "/auth/login",
            StatusCode::UNAUTHORIZED,
            r#"{"error":"Invalid email or password"}"#.into(),
        ));

        let err = holder.sign_in("pilot@example.com", "nope").await.unwrap_err();

        assert!(!err.is_auth_failure());
        let state = holder.state();
        assert_eq!(state.principal, None);
        assert_eq!(state.notice.as_deref(), Some("Invalid email or password"));
        assert_eq!(transport.sent(), vec!["/auth/login"]);
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_call_fails() {
        let (holder, _) = holder_with(StubTransport::default().route(
            "/auth/logout",
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"Internal server error"}"#.into(),
        ));
        holder.login(pilot());

        holder.logout().await;

        let state = holder.state();
        assert_eq!(state.principal, None);
        assert_eq!(state.route, Route::Login);
    }

    #[test]
    fn test_auth_error_signs_out() {
        let store = SessionStore::new();
        store.update(|state| {
            state.principal = Some(pilot());
            state.route = Route::App;
        });

        store.handle_auth_error(&ClientError::Unauthenticated);

        let state = store.snapshot();
        assert_eq!(state.principal, None);
        assert_eq!(state.route, Route::Login);
        assert_eq!(state.notice.as_deref(), Some(SESSION_EXPIRED_NOTICE));
    }

    #[test]
    fn test_other_error_only_sets_notice() {
        let store = SessionStore::new();
        store.update(|state| {
            state.principal = Some(pilot());
            state.route = Route::App;
        });

        store.handle_auth_error(&ClientError::NetworkFailure("connection reset".into()));

        let state = store.snapshot();
        assert_eq!(state.principal, Some(pilot()));
        assert_eq!(state.route, Route::App);
        assert_eq!(
            state.notice.as_deref(),
            Some("network failure: connection reset")
        );
    }

    #[tokio::test]
    async fn test_failed_background_refresh_signs_out() {
        let (holder, _) = holder_with(
            StubTransport::default()
                .route("/me", StatusCode::UNAUTHORIZED, "{}".into())
                .route("/auth/refresh", StatusCode::UNAUTHORIZED, "{}".into()),
        );
        holder.login(pilot());

        let err = holder.api().me().await.unwrap_err();

        assert_eq!(err, ClientError::Unauthorized);
        let state = holder.state();
        assert_eq!(state.principal, None);
        assert_eq!(state.notice.as_deref(), Some(SESSION_EXPIRED_NOTICE));
    }
}
