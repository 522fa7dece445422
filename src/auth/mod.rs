//! Cookie-carried JWT authentication.
//!
//! Dual-token system: short-lived access tokens (1 hour, stateless) and
//! long-lived refresh tokens (1 week, one current token per principal).
//! Protected routes sit behind [`request_gate`], which rotates an expired
//! session transparently.

mod cookie;
mod errors;
mod extractors;
mod gate;
mod ip;
mod state;

pub use cookie::{ACCESS_COOKIE_NAME, CookieSettings, REFRESH_COOKIE_NAME, get_cookie};
pub use errors::GateError;
pub use extractors::CurrentPrincipal;
pub use gate::{Admission, AuthenticatedPrincipal, admit, request_gate};
pub use ip::extract_client_ip;
pub use state::AuthState;
