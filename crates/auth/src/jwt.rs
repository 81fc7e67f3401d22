//! HS256 bearer-token verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::claims::{validate_claims, TokenClaims, TokenValidationError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed or unsigned token: {0}")]
    Decode(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a raw bearer token and yields its claims.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError>;
}

/// Shared-secret (HS256) validator, matching how the identity provider signs
/// user access tokens.
pub struct Hs256TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256TokenValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks run in `validate_claims` against an injected clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl std::fmt::Debug for Hs256TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hs256TokenValidator").finish_non_exhaustive()
    }
}

impl TokenValidator for Hs256TokenValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenError::Decode(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use reclaim_core::UserId;

    fn mint(secret: &str, claims: &TokenClaims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn fresh_claims(now: DateTime<Utc>) -> TokenClaims {
        TokenClaims {
            sub: UserId::new(),
            exp: now.timestamp() + 600,
            iat: Some(now.timestamp()),
            role: Some("authenticated".to_string()),
        }
    }

    #[test]
    fn valid_token_yields_claims() {
        let now = Utc::now();
        let claims = fresh_claims(now);
        let token = mint("secret", &claims);

        let validator = Hs256TokenValidator::new("secret");
        assert_eq!(validator.validate(&token, now).unwrap(), claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = mint("secret", &fresh_claims(now));

        let validator = Hs256TokenValidator::new("other");
        assert!(matches!(
            validator.validate(&token, now),
            Err(TokenError::Decode(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let token = mint("secret", &fresh_claims(now));

        let validator = Hs256TokenValidator::new("secret");
        let later = now + chrono::Duration::hours(1);
        assert_eq!(
            validator.validate(&token, later),
            Err(TokenError::Claims(TokenValidationError::Expired))
        );
    }

    #[test]
    fn garbage_is_rejected() {
        let validator = Hs256TokenValidator::new("secret");
        assert!(validator.validate("not.a.jwt", Utc::now()).is_err());
    }
}
