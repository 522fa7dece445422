//! Single-flight session refresh.
//!
//! The first request to see a 401 becomes the leader and sends the one
//! refresh call. Requests that see a 401 while that call is in flight wait
//! for its outcome instead of sending their own. Every waiter is replayed at
//! most once.
//!
//! A session request started while a refresh is in flight holds its first
//! send until the refresh settles. Sent earlier, its expired access token
//! would make the server's gate rotate the same refresh token the refresh
//! call is presenting, and only one of the two can win.

use reqwest::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::error::ClientError;
use super::request::{ApiRequest, ApiResponse, Attempt, AttemptNumber, RequestKind};
use super::transport::Transport;

/// The refresh response, shared by everyone who waited on it.
type Outcome = Result<ApiResponse, ClientError>;

/// Told about every failed refresh, once per refresh.
pub trait AuthFailureSink: Send + Sync {
    fn on_auth_failure(&self, error: &ClientError);
}

enum State {
    Idle,
    Refreshing { waiters: Vec<oneshot::Sender<Outcome>> },
}

enum Ticket {
    Leader,
    Follower(oneshot::Receiver<Outcome>),
}

pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
    refreshes: AtomicU64,
    sink: Option<Arc<dyn AuthFailureSink>>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Mutex::new(State::Idle),
            refreshes: AtomicU64::new(0),
            sink: None,
        }
    }

    pub fn with_failure_sink(mut self, sink: Arc<dyn AuthFailureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Number of refresh calls this coordinator has sent.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), State::Refreshing { .. })
    }

    /// Refresh the session now. Joins a refresh already in flight instead of
    /// sending a second one.
    pub async fn refresh_session(&self) -> Result<ApiResponse, ClientError> {
        self.await_refresh().await
    }

    /// Send `request`, refreshing the session and replaying once on a 401.
    ///
    /// Responses other than 401 are returned unchanged, failures included.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        if request.kind == RequestKind::Session {
            self.join_in_flight().await?;
        }
        let mut attempt = Attempt::initial(request);

        loop {
            let response = self.transport.send(&attempt.request).await?;
            if response.status != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            match (attempt.request.kind, attempt.number) {
                (RequestKind::Anonymous, _) => return Ok(response),
                (RequestKind::Refresh, _) => return Err(ClientError::Unauthorized),
                (RequestKind::Session, AttemptNumber::Retry) => {
                    debug!(path = %attempt.request.path, "Replay rejected");
                    return Err(ClientError::Unauthenticated);
                }
                (RequestKind::Session, AttemptNumber::Initial) => {
                    self.await_refresh().await?;
                    attempt = attempt.retry();
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue_or_refresh(&self) -> Ticket {
        let mut state = self.lock();
        match &mut *state {
            State::Idle => {
                *state = State::Refreshing {
                    waiters: Vec::new(),
                };
                Ticket::Leader
            }
            State::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Ticket::Follower(rx)
            }
        }
    }

    /// Wait for the refresh in flight, if any. Its failure is this request's
    /// failure.
    async fn join_in_flight(&self) -> Result<(), ClientError> {
        let rx = {
            let mut state = self.lock();
            let State::Refreshing { waiters } = &mut *state else {
                return Ok(());
            };
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            rx
        };

        debug!("Holding request until the refresh settles");
        rx.await
            .unwrap_or(Err(ClientError::RefreshAbandoned))
            .map(|_| ())
    }

    /// Back to `Idle` and hand `outcome` to everyone who queued.
    fn settle(&self, outcome: &Outcome) {
        let waiters = match std::mem::replace(&mut *self.lock(), State::Idle) {
            State::Refreshing { waiters } => waiters,
            State::Idle => Vec::new(),
        };

        for waiter in waiters {
            // A waiter whose request was dropped no longer listens.
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn await_refresh(&self) -> Outcome {
        match self.enqueue_or_refresh() {
            Ticket::Follower(rx) => rx.await.unwrap_or(Err(ClientError::RefreshAbandoned)),
            Ticket::Leader => {
                let guard = SettleOnDrop {
                    coordinator: self,
                    armed: true,
                };
                let outcome = self.refresh().await;
                guard.settle(&outcome);

                if let Err(e) = &outcome {
                    warn!(error = %e, "Session refresh failed");
                    if let Some(sink) = &self.sink {
                        sink.on_auth_failure(e);
                    }
                }
                outcome
            }
        }
    }

    async fn refresh(&self) -> Outcome {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        let response = self.transport.send(&ApiRequest::refresh()).await?;

        if response.is_success() {
            info!("Session refreshed");
            Ok(response)
        } else if response.status == StatusCode::UNAUTHORIZED {
            Err(ClientError::Unauthorized)
        } else {
            Err(response.into_error())
        }
    }
}

/// Releases followers if the leader's future is dropped mid-refresh.
struct SettleOnDrop<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl SettleOnDrop<'_> {
    fn settle(mut self, outcome: &Outcome) {
        self.armed = false;
        self.coordinator.settle(outcome);
    }
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Session refresh abandoned");
            self.coordinator.settle(&Err(ClientError::RefreshAbandoned));
        }
    }
}
