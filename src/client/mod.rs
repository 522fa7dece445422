//! Client side of the session protocol.
//!
//! All calls go through a [`RefreshCoordinator`]: a 401 caused by an expired
//! session triggers at most one refresh call no matter how many requests
//! observed it, and each waiting request is replayed once.

mod api;
mod coordinator;
mod error;
mod request;
mod session;
mod transport;

pub use api::{ApiClient, RegisteredUser};
pub use coordinator::{AuthFailureSink, RefreshCoordinator};
pub use error::ClientError;
pub use request::{ApiRequest, ApiResponse, Attempt, AttemptNumber, RequestKind};
pub use session::{Route, SESSION_EXPIRED_NOTICE, SessionHolder, SessionState, SessionStore};
pub use transport::{HttpTransport, Transport};
