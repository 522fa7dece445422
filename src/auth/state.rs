//! Shared state for the request gate and the auth endpoints.

use std::sync::Arc;

use super::cookie::CookieSettings;
use crate::issuer::TokenIssuer;

#[derive(Clone)]
pub struct AuthState {
    pub issuer: Arc<TokenIssuer>,
    pub cookies: CookieSettings,
}
