//! Blob namespace client.
//!
//! The backing store only offers flat listing of one directory's immediate
//! children and bulk removal of explicit object paths. There is no recursive
//! prefix delete, which is why the traversal engine exists at all.

use async_trait::async_trait;
use serde::Serialize;

pub mod in_memory;
pub mod storage_api;

pub use in_memory::{BlobCall, InMemoryBlobNamespace};
pub use storage_api::StorageApiNamespace;

/// What a listed entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A stored blob.
    Object,
    /// A sub-directory.
    Prefix,
    /// Neither (e.g. an entry with an empty name).
    Unknown,
}

/// One immediate child of a listed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Name relative to the listed prefix, without a trailing slash.
    pub name: String,
    pub kind: EntryKind,
}

impl BlobEntry {
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Object,
        }
    }

    pub fn prefix(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Prefix,
        }
    }
}

/// Listing sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    Name,
}

/// Page options for a single list call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: usize,
    pub sort_by: SortColumn,
}

impl ListOptions {
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            sort_by: SortColumn::Name,
        }
    }
}

impl Default for ListOptions {
    fn default() -> Self {
        Self::with_limit(Self::DEFAULT_PAGE_SIZE)
    }
}

/// Blob namespace errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    #[error("listing {prefix} failed: {message}")]
    Listing { prefix: String, message: String },
    #[error("deleting {count} objects failed: {message}")]
    Delete { count: usize, message: String },
}

/// Flat list / bulk remove client for a hierarchical blob store.
///
/// Removing an already-removed path is success.
#[async_trait]
pub trait BlobNamespace: Send + Sync {
    /// List one page of the immediate children of `prefix` (which ends with `/`).
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<Vec<BlobEntry>, BlobError>;

    /// Remove the given full object paths.
    async fn remove_batch(&self, bucket: &str, paths: &[String]) -> Result<(), BlobError>;
}
