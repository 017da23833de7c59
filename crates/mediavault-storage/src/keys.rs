//! Sandbox key construction and validation.
//!
//! Every asset a user owns lives under `users/{user_id}/public_images`. No
//! mutating operation may touch a key outside that prefix; `ensure_sandboxed`
//! is the single place that rule is written down.

use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};
use mediavault_core::constants::SANDBOX_SEGMENT;

/// The storage prefix that sandboxes a user's assets.
pub fn sandbox_root(user_id: Uuid) -> String {
    format!("users/{}/{}", user_id, SANDBOX_SEGMENT)
}

/// Join key segments, skipping empty ones.
pub fn join_key(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `key` is inside the sandbox rooted at `root`.
///
/// The check is segment-aware: `users/u/public_images_evil` is NOT inside
/// `users/u/public_images`.
pub fn is_sandboxed(key: &str, root: &str) -> bool {
    if key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return false;
    }
    key == root || key.starts_with(&format!("{}/", root))
}

/// Fail with `InvalidKey` unless `key` is inside the sandbox rooted at
/// `root`. Callers run this before issuing any backend call.
pub fn ensure_sandboxed(key: &str, root: &str) -> StorageResult<()> {
    if is_sandboxed(key, root) {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(format!(
            "key {:?} escapes sandbox {:?}",
            key, root
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_root_format() {
        let user_id = Uuid::nil();
        assert_eq!(
            sandbox_root(user_id),
            "users/00000000-0000-0000-0000-000000000000/public_images"
        );
    }

    #[test]
    fn test_join_key_skips_empty_segments() {
        assert_eq!(join_key(&["a", "", "b", "c.png"]), "a/b/c.png");
        assert_eq!(join_key(&["a/", "/b"]), "a/b");
    }

    #[test]
    fn test_is_sandboxed() {
        let root = "users/u1/public_images";
        assert!(is_sandboxed(root, root));
        assert!(is_sandboxed("users/u1/public_images/a/b.png", root));
        assert!(!is_sandboxed("users/u2/public_images/a.png", root));
        assert!(!is_sandboxed("users/u1/public_images_evil/a.png", root));
        assert!(!is_sandboxed("users/u1/public_images/../secrets", root));
        assert!(!is_sandboxed("/users/u1/public_images/a.png", root));
        assert!(!is_sandboxed("users/u1/public_images\\a.png", root));
    }

    #[test]
    fn test_ensure_sandboxed_error() {
        let result = ensure_sandboxed("elsewhere/file.png", "users/u1/public_images");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
