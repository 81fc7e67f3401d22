use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use reclaim_core::UserId;

/// Bearer token claims (transport-agnostic).
///
/// This is the minimal set of claims expected once a user token has been
/// decoded and its signature verified. Timestamps are unix seconds, as issued
/// by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,

    /// Expiration (unix seconds).
    pub exp: i64,

    /// Issued-at (unix seconds), when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Provider role string (e.g. `authenticated`), informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate token claims against `now`.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::jwt`].
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();

    if let Some(iat) = claims.iat {
        if claims.exp <= iat {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        if now < iat {
            return Err(TokenValidationError::NotYetValid);
        }
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(iat: Option<i64>, exp: i64) -> TokenClaims {
        TokenClaims {
            sub: UserId::new(),
            exp,
            iat,
            role: Some("authenticated".to_string()),
        }
    }

    #[test]
    fn accepts_token_inside_window() {
        let now = Utc::now();
        let c = claims(Some(now.timestamp() - 10), (now + Duration::minutes(5)).timestamp());
        assert_eq!(validate_claims(&c, now), Ok(()));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let c = claims(None, now.timestamp() - 1);
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));
    }

    #[test]
    fn rejects_future_token() {
        let now = Utc::now();
        let c = claims(Some(now.timestamp() + 60), now.timestamp() + 120);
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn rejects_inverted_window() {
        let now = Utc::now();
        let c = claims(Some(now.timestamp() + 60), now.timestamp() + 60);
        assert_eq!(
            validate_claims(&c, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
