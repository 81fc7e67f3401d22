//! Greedy depth-first traversal of one user's blob namespace.
//!
//! Each step lists one page of the cursor's directory and decides:
//!
//! - empty page at the root: done
//! - empty page below the root: reset to the root (the subtree is drained)
//! - any leaf on the page: delete every leaf on the page, stay
//! - only sub-prefixes: descend into the lexicographically first one
//!
//! No parent stack is kept. Every step removes objects, goes one level deeper,
//! restarts after a drained subtree, or terminates.

use std::sync::Arc;

use tracing::debug;

use reclaim_core::PathCursor;

use crate::blob::{BlobEntry, BlobError, BlobNamespace, EntryKind, ListOptions};

/// Decision for one listed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The root is empty.
    Complete,
    /// The directory is drained; go back to the root.
    Restart,
    /// The page only held entries that are neither leaves nor prefixes.
    Unclassifiable { count: usize },
    /// Remove these full object paths and list the same directory again.
    Delete(Vec<String>),
    /// Move into this sub-directory.
    Descend(PathCursor),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraversalError {
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error("{count} unclassifiable entries at {path}")]
    Unclassifiable { path: String, count: usize },
}

/// Decide the next step for `cursor` given one listed `page`.
pub fn plan(cursor: &PathCursor, page: &[BlobEntry]) -> Step {
    if page.is_empty() {
        return if cursor.is_root() {
            Step::Complete
        } else {
            Step::Restart
        };
    }

    let leaves: Vec<String> = page
        .iter()
        .filter(|e| e.kind == EntryKind::Object)
        .map(|e| cursor.object_path(&e.name))
        .collect();
    if !leaves.is_empty() {
        return Step::Delete(leaves);
    }

    match page.iter().find(|e| e.kind == EntryKind::Prefix) {
        Some(first) => Step::Descend(cursor.descend(&first.name)),
        None => Step::Unclassifiable { count: page.len() },
    }
}

/// Outcome of one engine iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Nothing left under the root.
    Done,
    /// `count` objects were removed; the cursor stays put.
    Deleted { count: usize },
    /// The cursor moved one level down.
    Descended(PathCursor),
    /// The cursor goes back to the root. `unclassifiable` is non-zero when the
    /// directory was not drained but held nothing the engine can act on.
    Restarted { unclassifiable: usize },
}

impl Advance {
    /// Cursor for the next iteration, or `None` when done.
    pub fn next_cursor(&self, cursor: &PathCursor) -> Option<PathCursor> {
        match self {
            Advance::Done => None,
            Advance::Deleted { .. } => Some(cursor.clone()),
            Advance::Descended(next) => Some(next.clone()),
            Advance::Restarted { .. } => Some(cursor.to_root()),
        }
    }
}

/// Runs `plan` against a live blob namespace.
#[derive(Clone)]
pub struct TraversalEngine {
    blob: Arc<dyn BlobNamespace>,
    bucket: String,
    options: ListOptions,
}

impl TraversalEngine {
    pub fn new(blob: Arc<dyn BlobNamespace>, bucket: impl Into<String>, options: ListOptions) -> Self {
        Self {
            blob,
            bucket: bucket.into(),
            options,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// One list call, followed by at most one remove call.
    ///
    /// An unclassifiable page below the root restarts from the root; at the
    /// root it is an error, since restarting would observe the same page.
    pub async fn advance(&self, cursor: &PathCursor) -> Result<Advance, TraversalError> {
        let page = self
            .blob
            .list(&self.bucket, cursor.as_str(), &self.options)
            .await?;

        match plan(cursor, &page) {
            Step::Complete => Ok(Advance::Done),
            Step::Restart => {
                debug!(path = %cursor, "directory drained, restarting from root");
                Ok(Advance::Restarted { unclassifiable: 0 })
            }
            Step::Unclassifiable { count } if cursor.is_root() => {
                Err(TraversalError::Unclassifiable {
                    path: cursor.to_string(),
                    count,
                })
            }
            Step::Unclassifiable { count } => {
                debug!(path = %cursor, count, "unclassifiable entries, restarting from root");
                Ok(Advance::Restarted {
                    unclassifiable: count,
                })
            }
            Step::Delete(paths) => {
                self.blob.remove_batch(&self.bucket, &paths).await?;
                debug!(path = %cursor, count = paths.len(), "deleted objects");
                Ok(Advance::Deleted { count: paths.len() })
            }
            Step::Descend(next) => {
                debug!(path = %next, "descending");
                Ok(Advance::Descended(next))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{BlobCall, InMemoryBlobNamespace};
    use proptest::prelude::*;
    use reclaim_core::UserId;
    use uuid::Uuid;

    const BUCKET: &str = "review_images";

    fn user() -> UserId {
        UserId::from_uuid(Uuid::from_u128(1))
    }

    fn engine(blob: Arc<InMemoryBlobNamespace>, page_size: usize) -> TraversalEngine {
        TraversalEngine::new(blob, BUCKET, ListOptions::with_limit(page_size))
    }

    async fn drain(engine: &TraversalEngine, max_steps: usize) -> Result<(usize, usize), TraversalError> {
        let mut cursor = PathCursor::root(user());
        let mut deleted = 0;
        for step in 1..=max_steps {
            let advance = engine.advance(&cursor).await?;
            if let Advance::Deleted { count } = advance {
                deleted += count;
            }
            match advance.next_cursor(&cursor) {
                Some(next) => cursor = next,
                None => return Ok((deleted, step)),
            }
        }
        panic!("traversal did not finish within {max_steps} steps");
    }

    #[test]
    fn plan_prefers_leaves_over_prefixes() {
        let root = PathCursor::root(user());
        let page = vec![BlobEntry::prefix("a"), BlobEntry::object("b.jpg")];
        assert_eq!(
            plan(&root, &page),
            Step::Delete(vec![root.object_path("b.jpg")])
        );
    }

    #[test]
    fn plan_descends_into_first_prefix() {
        let root = PathCursor::root(user());
        let page = vec![BlobEntry::prefix("a"), BlobEntry::prefix("b")];
        assert_eq!(plan(&root, &page), Step::Descend(root.descend("a")));
    }

    #[test]
    fn plan_empty_page() {
        let root = PathCursor::root(user());
        assert_eq!(plan(&root, &[]), Step::Complete);
        assert_eq!(plan(&root.descend("a"), &[]), Step::Restart);
    }

    #[test]
    fn plan_flags_unclassifiable_pages() {
        let root = PathCursor::root(user());
        let junk = vec![BlobEntry {
            name: String::new(),
            kind: EntryKind::Unknown,
        }];
        assert_eq!(plan(&root, &junk), Step::Unclassifiable { count: 1 });
    }

    #[tokio::test]
    async fn unclassifiable_below_root_restarts() {
        let blob = Arc::new(InMemoryBlobNamespace::new());
        let root = PathCursor::root(user());
        blob.put(BUCKET, format!("{root}empty/"));

        let engine = engine(blob, 100);
        let inner = root.descend("empty");
        let advance = engine.advance(&inner).await.unwrap();
        assert_eq!(advance, Advance::Restarted { unclassifiable: 1 });
        assert_eq!(advance.next_cursor(&inner), Some(root));
    }

    #[tokio::test]
    async fn unclassifiable_at_root_is_an_error() {
        let blob = Arc::new(InMemoryBlobNamespace::new());
        let root = PathCursor::root(user());
        blob.put(BUCKET, root.as_str());

        let err = engine(blob, 100).advance(&root).await.unwrap_err();
        assert!(matches!(err, TraversalError::Unclassifiable { count: 1, .. }));
    }

    #[tokio::test]
    async fn concrete_scenario_trace() {
        let blob = Arc::new(InMemoryBlobNamespace::new());
        let root = PathCursor::root(user());
        let folder = root.descend("folder1");
        blob.put(BUCKET, root.object_path("a.jpg"));
        blob.put(BUCKET, folder.object_path("b.jpg"));
        blob.put(BUCKET, folder.object_path("c.jpg"));

        let (deleted, _) = drain(&engine(blob.clone(), 100), 20).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(blob.object_count(BUCKET), 0);

        let list = |p: &PathCursor| BlobCall::List {
            bucket: BUCKET.to_string(),
            prefix: p.to_string(),
        };
        let remove = |paths: Vec<String>| BlobCall::Remove {
            bucket: BUCKET.to_string(),
            paths,
        };
        assert_eq!(
            blob.calls(),
            vec![
                list(&root),
                remove(vec![root.object_path("a.jpg")]),
                list(&root),
                list(&folder),
                remove(vec![folder.object_path("b.jpg"), folder.object_path("c.jpg")]),
                list(&folder),
                list(&root),
            ]
        );
    }

    #[tokio::test]
    async fn other_users_are_untouched() {
        let blob = Arc::new(InMemoryBlobNamespace::new());
        let root = PathCursor::root(user());
        let other = PathCursor::root(UserId::from_uuid(Uuid::from_u128(2)));
        blob.put(BUCKET, root.object_path("a.jpg"));
        blob.put(BUCKET, other.object_path("keep.jpg"));

        drain(&engine(blob.clone(), 100), 10).await.unwrap();
        assert_eq!(blob.objects(BUCKET), vec![other.object_path("keep.jpg")]);
    }

    #[tokio::test]
    async fn listing_errors_propagate() {
        let blob = Arc::new(InMemoryBlobNamespace::new());
        blob.fail_lists("boom");

        let err = engine(blob, 100)
            .advance(&PathCursor::root(user()))
            .await
            .unwrap_err();
        assert!(matches!(err, TraversalError::Blob(BlobError::Listing { .. })));
    }

    fn tree() -> impl Strategy<Value = Vec<Vec<String>>> {
        let segment = prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(str::to_string);
        prop::collection::vec(prop::collection::vec(segment, 1..5), 0..30)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn any_tree_drains_with_progress(paths in tree(), page_size in 1usize..4) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let blob = Arc::new(InMemoryBlobNamespace::new());
                let root = PathCursor::root(user());
                for segments in &paths {
                    // Leaves are suffixed so no key doubles as a directory name.
                    blob.put(BUCKET, format!("{root}{}.bin", segments.join("/")));
                }
                let objects = blob.object_count(BUCKET);

                let engine = engine(blob.clone(), page_size);
                let mut cursor = root.clone();
                let mut remaining = objects;
                let mut steps = 0;

                loop {
                    steps += 1;
                    prop_assert!(steps <= 1 + objects * 64, "too many steps");

                    let advance = engine.advance(&cursor).await.unwrap();
                    match &advance {
                        Advance::Done => break,
                        Advance::Deleted { count } => {
                            prop_assert!(*count > 0);
                            remaining -= count;
                        }
                        Advance::Descended(next) => {
                            prop_assert_eq!(next.depth(), cursor.depth() + 1);
                        }
                        Advance::Restarted { unclassifiable } => {
                            prop_assert_eq!(*unclassifiable, 0);
                            prop_assert!(!cursor.is_root(), "restart from the root");
                        }
                    }
                    if let Some(next) = advance.next_cursor(&cursor) {
                        cursor = next;
                    }
                }

                prop_assert_eq!(blob.object_count(BUCKET), 0);
                prop_assert_eq!(remaining, 0);
                Ok(())
            })?;
        }
    }
}
