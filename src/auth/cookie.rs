//! Session cookie parsing and construction.

use axum::http::{HeaderMap, HeaderValue, header};

use crate::issuer::TokenPair;

/// Cookie name for the access token (short-lived, 1 hour).
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh token (long-lived, 1 week).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                let value = value.trim();
                return (!value.is_empty()).then_some(value);
            }
        }
    }
    None
}

/// Attributes shared by every session cookie.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieSettings {
    /// Add the `Secure` attribute (production, HTTPS)
    pub secure: bool,
}

impl CookieSettings {
    fn cookie(&self, name: &str, value: &str, max_age: u64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
            name, value, max_age, secure
        )
    }

    /// `Set-Cookie` values carrying a freshly issued pair.
    pub fn session_cookies(&self, tokens: &TokenPair) -> [String; 2] {
        [
            self.cookie(
                ACCESS_COOKIE_NAME,
                &tokens.access.token,
                tokens.access.duration,
            ),
            self.cookie(
                REFRESH_COOKIE_NAME,
                &tokens.refresh.token,
                tokens.refresh.duration,
            ),
        ]
    }

    /// `Set-Cookie` values that delete both session cookies.
    pub fn cleared_cookies(&self) -> [String; 2] {
        [
            self.cookie(ACCESS_COOKIE_NAME, "", 0),
            self.cookie(REFRESH_COOKIE_NAME, "", 0),
        ]
    }

    /// Append the pair's cookies to an outgoing response's headers.
    pub fn append_session_cookies(&self, headers: &mut HeaderMap, tokens: &TokenPair) {
        for cookie in self.session_cookies(tokens) {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.append(header::SET_COOKIE, value);
            }
        }
    }
}
