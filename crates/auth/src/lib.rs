//! `reclaim-auth`: trigger authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: the API layer
//! extracts the bearer token and hands it here; the processor never sees auth.

pub mod caller;
pub mod claims;
pub mod jwt;

pub use caller::{authorize_job, require_service_role, AuthError, AuthzError, Caller, CallerResolver};
pub use claims::{validate_claims, TokenClaims, TokenValidationError};
pub use jwt::{Hs256TokenValidator, TokenError, TokenValidator};
