//! Hierarchical blob namespace paths.
//!
//! Every user owns the namespace `"{user_id}/"`. A [`PathCursor`] always points
//! at a directory inside that namespace (it ends with `/`) and is the only
//! traversal state that crosses an invocation boundary.

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Directory cursor inside a user's namespace.
///
/// Invariant: `path` starts with the root (`"{user_id}/"`) and ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathCursor {
    path: String,
    root_len: usize,
}

impl PathCursor {
    /// Cursor positioned at the root of `user_id`'s namespace.
    pub fn root(user_id: UserId) -> Self {
        let path = format!("{user_id}/");
        let root_len = path.len();
        Self { path, root_len }
    }

    /// Rebuild a cursor from a path received in a continuation payload.
    ///
    /// A missing trailing slash is tolerated (`"u1"` resumes at `"u1/"`); a path
    /// outside the namespace is rejected.
    pub fn resume(user_id: UserId, raw: &str) -> DomainResult<Self> {
        let root = Self::root(user_id);
        let raw = raw.trim();

        let mut path = raw.to_string();
        if !path.ends_with('/') {
            path.push('/');
        }

        if !path.starts_with(root.as_str()) {
            return Err(DomainError::OutsideNamespace {
                path: raw.to_string(),
                root: root.path,
            });
        }

        let below_root = &path[root.root_len..];
        if below_root
            .split_terminator('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(DomainError::validation(format!(
                "path {raw:?} contains an empty or relative segment"
            )));
        }

        Ok(Self {
            path,
            root_len: root.root_len,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Whether the cursor points at the namespace root.
    pub fn is_root(&self) -> bool {
        self.path.len() == self.root_len
    }

    /// Number of directory levels below the root.
    pub fn depth(&self) -> usize {
        self.path[self.root_len..].matches('/').count()
    }

    /// Cursor reset to the namespace root.
    pub fn to_root(&self) -> Self {
        Self {
            path: self.path[..self.root_len].to_string(),
            root_len: self.root_len,
        }
    }

    /// Cursor one level down, inside the sub-prefix `name`.
    pub fn descend(&self, name: &str) -> Self {
        let name = name.trim_end_matches('/');
        Self {
            path: format!("{}{}/", self.path, name),
            root_len: self.root_len,
        }
    }

    /// Full object path of the leaf `name` in this directory.
    pub fn object_path(&self, name: &str) -> String {
        format!("{}{}", self.path, name)
    }
}

impl core::fmt::Display for PathCursor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.path)
    }
}

impl AsRef<str> for PathCursor {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn user() -> UserId {
        UserId::from_uuid(Uuid::from_u128(1))
    }

    #[test]
    fn root_ends_with_slash() {
        let root = PathCursor::root(user());
        assert_eq!(root.as_str(), "00000000-0000-0000-0000-000000000001/");
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn descend_and_reset() {
        let root = PathCursor::root(user());
        let inner = root.descend("folder1").descend("nested/");

        assert_eq!(inner.as_str(), format!("{}folder1/nested/", root));
        assert_eq!(inner.depth(), 2);
        assert!(!inner.is_root());
        assert_eq!(inner.to_root(), root);
        assert_eq!(inner.object_path("a.jpg"), format!("{}folder1/nested/a.jpg", root));
    }

    #[test]
    fn resume_normalizes_missing_trailing_slash() {
        let root = PathCursor::root(user());
        let bare = root.as_str().trim_end_matches('/');

        assert_eq!(PathCursor::resume(user(), bare).unwrap(), root);

        let deep = PathCursor::resume(user(), &format!("{root}folder1")).unwrap();
        assert_eq!(deep, root.descend("folder1"));
    }

    #[test]
    fn resume_rejects_foreign_namespace() {
        let other = UserId::from_uuid(Uuid::from_u128(2));
        let foreign = PathCursor::root(other).descend("x");

        let err = PathCursor::resume(user(), foreign.as_str()).unwrap_err();
        assert!(matches!(err, DomainError::OutsideNamespace { .. }));
    }

    #[test]
    fn resume_rejects_relative_segments() {
        let root = PathCursor::root(user());
        assert!(PathCursor::resume(user(), &format!("{root}../escape/")).is_err());
        assert!(PathCursor::resume(user(), &format!("{root}a//b/")).is_err());
    }

    proptest! {
        #[test]
        fn descend_increases_depth_by_one(
            segments in prop::collection::vec("[a-z0-9_.-]{1,12}", 0..6)
        ) {
            prop_assume!(segments.iter().all(|s| s != "." && s != ".."));

            let mut cursor = PathCursor::root(user());
            for (i, segment) in segments.iter().enumerate() {
                cursor = cursor.descend(segment);
                prop_assert_eq!(cursor.depth(), i + 1);
            }

            let resumed = PathCursor::resume(user(), cursor.as_str()).unwrap();
            prop_assert_eq!(resumed, cursor);
        }
    }
}
