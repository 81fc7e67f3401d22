//! Deletion job records: the status machine, the store abstraction, and its
//! in-memory and Postgres implementations.

pub mod postgres;
pub mod store;
pub mod types;

pub use postgres::PostgresDeletionJobStore;
pub use store::{DeletionJobStore, InMemoryDeletionJobStore, JobStoreError};
pub use types::{DEFAULT_BUCKET, DeletionJob, JobStatus};
