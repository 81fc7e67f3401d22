//! In-memory blob namespace for tests/dev.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{BlobEntry, BlobError, BlobNamespace, EntryKind, ListOptions};

/// One call observed by [`InMemoryBlobNamespace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobCall {
    List { bucket: String, prefix: String },
    Remove { bucket: String, paths: Vec<String> },
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, BTreeSet<String>>,
    calls: Vec<BlobCall>,
    fail_list: Option<String>,
    fail_remove: Option<String>,
}

/// Object keys held per bucket, with a call log and failure injection.
///
/// Directories are implied by `/` in object keys. A key ending in `/` is a
/// placeholder that lists as an entry with an empty name inside that
/// directory, which neither leaf nor prefix classification accepts.
#[derive(Debug, Default)]
pub struct InMemoryBlobNamespace {
    state: Mutex<State>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryBlobNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object at `path`.
    pub fn put(&self, bucket: &str, path: impl Into<String>) {
        lock(&self.state)
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(path.into());
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        lock(&self.state).buckets.get(bucket).map_or(0, BTreeSet::len)
    }

    /// All object paths in `bucket`, sorted.
    pub fn objects(&self, bucket: &str) -> Vec<String> {
        lock(&self.state)
            .buckets
            .get(bucket)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BlobCall> {
        lock(&self.state).calls.clone()
    }

    pub fn remove_calls(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| matches!(c, BlobCall::Remove { .. }))
            .count()
    }

    /// Make every subsequent `list` call fail with `message`.
    pub fn fail_lists(&self, message: impl Into<String>) {
        lock(&self.state).fail_list = Some(message.into());
    }

    /// Make every subsequent `remove_batch` call fail with `message`.
    pub fn fail_removes(&self, message: impl Into<String>) {
        lock(&self.state).fail_remove = Some(message.into());
    }

    pub fn clear_failures(&self) {
        let mut state = lock(&self.state);
        state.fail_list = None;
        state.fail_remove = None;
    }
}

#[async_trait]
impl BlobNamespace for InMemoryBlobNamespace {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        options: &ListOptions,
    ) -> Result<Vec<BlobEntry>, BlobError> {
        let mut state = lock(&self.state);
        state.calls.push(BlobCall::List {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        });

        if let Some(message) = &state.fail_list {
            return Err(BlobError::Listing {
                prefix: prefix.to_string(),
                message: message.clone(),
            });
        }

        let Some(keys) = state.buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        let mut children: BTreeSet<(String, u8)> = BTreeSet::new();
        for rest in keys.iter().filter_map(|k| k.strip_prefix(prefix)) {
            match rest.split_once('/') {
                Some((dir, _)) if !dir.is_empty() => {
                    children.insert((dir.to_string(), 0));
                }
                Some(_) => {
                    children.insert((String::new(), 2));
                }
                None if rest.is_empty() => {
                    children.insert((String::new(), 2));
                }
                None => {
                    children.insert((rest.to_string(), 1));
                }
            }
        }

        Ok(children
            .into_iter()
            .take(options.limit)
            .map(|(name, kind)| BlobEntry {
                name,
                kind: match kind {
                    0 => EntryKind::Prefix,
                    1 => EntryKind::Object,
                    _ => EntryKind::Unknown,
                },
            })
            .collect())
    }

    async fn remove_batch(&self, bucket: &str, paths: &[String]) -> Result<(), BlobError> {
        let mut state = lock(&self.state);
        state.calls.push(BlobCall::Remove {
            bucket: bucket.to_string(),
            paths: paths.to_vec(),
        });

        if let Some(message) = &state.fail_remove {
            return Err(BlobError::Delete {
                count: paths.len(),
                message: message.clone(),
            });
        }

        if let Some(keys) = state.buckets.get_mut(bucket) {
            for path in paths {
                keys.remove(path);
            }
        }
        Ok(())
    }
}
