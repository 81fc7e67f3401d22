//! Infrastructure layer: job records, blob storage, and the deletion processor.
//!
//! ## Components
//!
//! - `jobs`: the `DeletionJob` record and its stores (in-memory, Postgres)
//! - `blob`: the flat list / bulk remove namespace client (in-memory, storage REST API)
//! - `traversal`: greedy depth-first descent over one user's namespace
//! - `continuation`: soft deadline and self re-invocation
//! - `lifecycle`: status transitions and log appends
//! - `processor`: one invocation of the reclamation saga

pub mod blob;
pub mod continuation;
pub mod jobs;
pub mod lifecycle;
pub mod processor;
pub mod traversal;

pub use processor::{DeletionProcessor, Invocation, ProcessorConfig, ProcessorError, RunOutcome};
