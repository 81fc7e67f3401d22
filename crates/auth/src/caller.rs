use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use reclaim_core::UserId;

use crate::jwt::{TokenError, TokenValidator};

/// Who is calling the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// Holder of the service-role key (operators, database triggers, and
    /// continuation links forwarding that key).
    ServiceRole,
    /// An authenticated end user.
    User(UserId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("user id mismatch")]
    UserMismatch,

    #[error("service role required")]
    ServiceRoleRequired,
}

/// Resolves a raw bearer token into a [`Caller`].
#[derive(Clone)]
pub struct CallerResolver {
    service_role_key: Option<String>,
    validator: Arc<dyn TokenValidator>,
}

impl CallerResolver {
    pub fn new(service_role_key: Option<String>, validator: Arc<dyn TokenValidator>) -> Self {
        Self {
            service_role_key: service_role_key.filter(|k| !k.is_empty()),
            validator,
        }
    }

    pub fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<Caller, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        if self.service_role_key.as_deref() == Some(token) {
            tracing::debug!("service role key presented");
            return Ok(Caller::ServiceRole);
        }

        let claims = self.validator.validate(token, now)?;
        Ok(Caller::User(claims.sub))
    }
}

impl std::fmt::Debug for CallerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerResolver")
            .field("service_role_key", &self.service_role_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// A user may only reclaim their own namespace; the service role may reclaim any.
pub fn authorize_job(caller: &Caller, owner: UserId) -> Result<(), AuthzError> {
    match caller {
        Caller::ServiceRole => Ok(()),
        Caller::User(user_id) if *user_id == owner => Ok(()),
        Caller::User(_) => Err(AuthzError::UserMismatch),
    }
}

pub fn require_service_role(caller: &Caller) -> Result<(), AuthzError> {
    match caller {
        Caller::ServiceRole => Ok(()),
        Caller::User(_) => Err(AuthzError::ServiceRoleRequired),
    }
}
