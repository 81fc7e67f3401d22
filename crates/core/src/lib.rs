//! `reclaim-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, and the namespace path cursor that the
//! traversal engine walks.

pub mod error;
pub mod id;
pub mod namespace;

pub use error::{DomainError, DomainResult};
pub use id::{JobId, UserId};
pub use namespace::PathCursor;
