//! Token issuance and rotation.
//!
//! Every successful [`TokenIssuer::issue`] or [`TokenIssuer::rotate`] overwrites
//! the principal's refresh token record, so at most one refresh token per
//! principal is valid at any time. Access tokens are verified statelessly.

use std::sync::Arc;

use tracing::{error, warn};

use crate::db::{Database, Principal};
use crate::jwt::{AccessTokenResult, JwtConfig, JwtError, RefreshTokenResult};

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: AccessTokenResult,
    pub refresh: RefreshTokenResult,
}

/// Outcome of a successful rotation.
#[derive(Debug, Clone)]
pub struct Rotation {
    pub principal: Principal,
    pub tokens: TokenPair,
}

/// Why an access token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Authentic, but past its expiry. Eligible for a refresh.
    #[error("access token expired")]
    Expired,
    /// Malformed, forged, wrong type, or signed with another key.
    #[error("access token invalid")]
    Invalid,
}

#[derive(Debug, thiserror::Error)]
pub enum RotateError {
    /// Not a refresh token we signed.
    #[error("refresh token invalid")]
    Invalid,
    /// Signed by us but past its expiry.
    #[error("refresh token expired")]
    Stale,
    /// Signature is fine but it is not the principal's current refresh token
    /// (already rotated, revoked, or the principal is gone).
    #[error("refresh token does not match the current session")]
    Unauthorized,
    #[error("token minting failed: {0}")]
    Minting(#[from] JwtError),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("token minting failed: {0}")]
    Minting(#[from] JwtError),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub struct TokenIssuer {
    jwt: Arc<JwtConfig>,
    db: Database,
}

impl TokenIssuer {
    pub fn new(jwt: Arc<JwtConfig>, db: Database) -> Self {
        Self { jwt, db }
    }

    fn mint(&self, principal_id: i64) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access: self.jwt.generate_access_token(principal_id)?,
            refresh: self.jwt.generate_refresh_token(principal_id)?,
        })
    }

    /// Mint a new pair and make its refresh token the principal's only valid one.
    pub async fn issue(&self, principal_id: i64) -> Result<TokenPair, IssueError> {
        let tokens = self.mint(principal_id)?;

        self.db
            .tokens()
            .replace(
                principal_id,
                &tokens.refresh.jti,
                tokens.refresh.expires_at,
            )
            .await
            .inspect_err(|e| error!(principal_id, error = %e, "Failed to store refresh token"))?;

        Ok(tokens)
    }

    /// Check signature, type and expiry of an access token. No storage access.
    pub fn verify_access(&self, token: &str) -> Result<i64, AccessError> {
        match self.jwt.validate_access_token(token) {
            Ok(claims) => claims.principal_id().map_err(|_| AccessError::Invalid),
            Err(JwtError::Expired) => Err(AccessError::Expired),
            Err(_) => Err(AccessError::Invalid),
        }
    }

    /// Exchange the principal's current refresh token for a new pair.
    ///
    /// The presented token must verify and must still be the stored one; the
    /// check and the overwrite happen in a single conditional update, so two
    /// concurrent rotations of the same token cannot both succeed.
    pub async fn rotate(&self, refresh_token: &str) -> Result<Rotation, RotateError> {
        let claims = match self.jwt.validate_refresh_token(refresh_token) {
            Ok(claims) => claims,
            Err(JwtError::Expired) => {
                warn!("Rejected expired refresh token");
                return Err(RotateError::Stale);
            }
            Err(e) => {
                warn!(error = %e, "Rejected invalid refresh token");
                return Err(RotateError::Invalid);
            }
        };
        let principal_id = claims.principal_id().map_err(|_| RotateError::Invalid)?;

        let principal = self
            .db
            .users()
            .get_by_id(principal_id)
            .await
            .inspect_err(|e| error!(principal_id, error = %e, "Failed to load principal"))?;
        let Some(principal) = principal else {
            warn!(principal_id, "Refresh token for unknown principal");
            return Err(RotateError::Unauthorized);
        };

        let tokens = self.mint(principal_id)?;

        let replaced = self
            .db
            .tokens()
            .compare_and_replace(
                principal_id,
                &claims.jti,
                &tokens.refresh.jti,
                tokens.refresh.expires_at,
            )
            .await
            .inspect_err(|e| error!(principal_id, error = %e, "Failed to rotate refresh token"))?;

        if !replaced {
            warn!(principal_id, jti = %claims.jti, "Refresh token is not the current one");
            return Err(RotateError::Unauthorized);
        }

        Ok(Rotation { principal, tokens })
    }

    /// Drop the principal's refresh token record so no later rotation succeeds.
    pub async fn revoke(&self, principal_id: i64) -> Result<(), IssueError> {
        self.db
            .tokens()
            .clear(principal_id)
            .await
            .inspect_err(|e| error!(principal_id, error = %e, "Failed to revoke refresh token"))?;
        Ok(())
    }

    /// Principal named by a refresh token, if it is authentic and current.
    /// Used by logout, which must not rotate anything.
    pub async fn current_refresh_owner(
        &self,
        refresh_token: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        let Ok(claims) = self.jwt.validate_refresh_token(refresh_token) else {
            return Ok(None);
        };
        let Ok(principal_id) = claims.principal_id() else {
            return Ok(None);
        };
        let record = self.db.tokens().get(principal_id).await?;
        Ok(record
            .filter(|r| r.current_jti == claims.jti)
            .map(|r| r.principal_id))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}
