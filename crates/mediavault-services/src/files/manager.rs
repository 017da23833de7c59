//! Path-scoped file operations within one user's sandbox.
//!
//! Every operation validates its target against the sandbox root before any
//! backend call; a path outside `users/{user_id}/public_images` fails with
//! `SecurityViolation` and performs no I/O. Folders are directory markers
//! (a zero-byte `.keep` object), not tracked entities.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use uuid::Uuid;

use mediavault_core::constants::FOLDER_MARKER;
use mediavault_core::validation::{validate_file_name, validate_folder_name};
use mediavault_core::{AppError, StoredAsset};
use mediavault_storage::{is_sandboxed, join_key, sandbox_root, Storage};

pub struct FileManager {
    storage: Arc<dyn Storage>,
    root: String,
}

impl FileManager {
    pub fn new(storage: Arc<dyn Storage>, user_id: Uuid) -> Self {
        FileManager {
            storage,
            root: sandbox_root(user_id),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// The sandbox rule. Runs before every backend call.
    fn guard(&self, key: &str) -> Result<(), AppError> {
        if is_sandboxed(key, &self.root) {
            Ok(())
        } else {
            Err(AppError::SecurityViolation(format!(
                "path {:?} is outside the sandbox {:?}",
                key, self.root
            )))
        }
    }

    /// List the entries of a folder: folders first, then files, each group
    /// in case-sensitive lexicographic order by name. An empty folder yields
    /// an empty list, not an error.
    pub async fn list(&self, path: &str) -> Result<Vec<StoredAsset>, AppError> {
        self.guard(path)?;

        let listing = self.storage.list(path).await.map_err(AppError::from)?;

        let mut folders = Vec::with_capacity(listing.folders.len());
        for prefix in listing.folders {
            folders.push(StoredAsset::folder(prefix)?);
        }
        folders.sort_by(|a, b| a.name.cmp(&b.name));

        let mut files = Vec::new();
        for key in listing.files {
            if key.rsplit('/').next() == Some(FOLDER_MARKER) {
                continue;
            }
            let meta = self.storage.metadata(&key).await.map_err(AppError::from)?;
            files.push(StoredAsset::file(
                key,
                meta.size,
                meta.content_type,
                meta.created_at,
            )?);
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        folders.extend(files);
        Ok(folders)
    }

    /// Create a folder under `path` by writing its directory marker.
    pub async fn create_folder(&self, path: &str, name: &str) -> Result<StoredAsset, AppError> {
        self.guard(path)?;
        validate_folder_name(name)?;

        let folder_key = join_key(&[path, name]);
        self.guard(&folder_key)?;

        let marker = join_key(&[&folder_key, FOLDER_MARKER]);
        self.storage
            .put(&marker, Vec::new(), "application/octet-stream", &HashMap::new())
            .await
            .map_err(AppError::from)?;

        tracing::info!(folder = %folder_key, "Folder created");
        StoredAsset::folder(folder_key)
    }

    /// Rename a file or folder in place. Returns the new key (for folders,
    /// the new prefix).
    pub async fn rename(&self, path: &str, new_name: &str) -> Result<String, AppError> {
        self.guard(path)?;

        // Every folder-valid name is also file-valid, so the file rule is
        // the weaker one; a name failing it can never succeed. Checked here
        // so invalid names are rejected before the kind lookup touches the
        // backend.
        validate_file_name(new_name)?;

        let parent = parent_of(path);
        let target = join_key(&[&parent, new_name]);
        self.guard(&target)?;

        if self.storage.exists(path).await.map_err(AppError::from)? {
            validate_file_name(new_name)?;
            if target != path {
                self.storage.copy(path, &target).await.map_err(AppError::from)?;
                self.storage.delete(path).await.map_err(AppError::from)?;
            }
        } else {
            validate_folder_name(new_name)?;
            if target != path {
                self.relocate_tree(path, &target).await?;
            }
        }

        tracing::info!(from = %path, to = %target, "Renamed");
        Ok(target)
    }

    /// Move a file or folder under a different parent folder. Returns the
    /// new key.
    pub async fn move_to(&self, path: &str, dest_path: &str) -> Result<String, AppError> {
        self.guard(path)?;
        self.guard(dest_path)?;

        let name = leaf_of(path);
        let target = join_key(&[dest_path, &name]);
        self.guard(&target)?;

        if target == path {
            return Ok(target);
        }
        if is_sandboxed(&target, path) {
            return Err(AppError::InvalidInput(format!(
                "cannot move {:?} into itself",
                path
            )));
        }

        if self.storage.exists(path).await.map_err(AppError::from)? {
            self.storage.copy(path, &target).await.map_err(AppError::from)?;
            self.storage.delete(path).await.map_err(AppError::from)?;
        } else {
            self.relocate_tree(path, &target).await?;
        }

        tracing::info!(from = %path, to = %target, "Moved");
        Ok(target)
    }

    /// Delete a file, or a folder and (when `recursive`) everything in it.
    pub async fn delete(&self, path: &str, recursive: bool) -> Result<(), AppError> {
        self.guard(path)?;

        if self.storage.exists(path).await.map_err(AppError::from)? {
            self.storage.delete(path).await.map_err(AppError::from)?;
            tracing::info!(key = %path, "File deleted");
            return Ok(());
        }

        let keys = self.collect_keys(path.to_string()).await?;
        if !recursive {
            let has_content = keys
                .iter()
                .any(|key| key.rsplit('/').next() != Some(FOLDER_MARKER));
            if has_content {
                return Err(AppError::InvalidInput(format!(
                    "folder {:?} is not empty",
                    path
                )));
            }
        }
        for key in &keys {
            self.storage.delete(key).await.map_err(AppError::from)?;
        }

        tracing::info!(prefix = %path, objects = keys.len(), "Folder deleted");
        Ok(())
    }

    /// Copy every object under `from` to the same relative key under `to`,
    /// then delete the originals. Sequential copies; a mid-sequence backend
    /// failure surfaces as `StorageUnavailable` and may leave both trees
    /// partially populated.
    async fn relocate_tree(&self, from: &str, to: &str) -> Result<(), AppError> {
        let keys = self.collect_keys(from.to_string()).await?;
        if keys.is_empty() {
            return Err(AppError::NotFound(from.to_string()));
        }

        for key in &keys {
            let suffix = &key[from.len()..];
            let target = format!("{}{}", to, suffix);
            self.guard(&target)?;
            self.storage.copy(key, &target).await.map_err(AppError::from)?;
        }
        for key in &keys {
            self.storage.delete(key).await.map_err(AppError::from)?;
        }
        Ok(())
    }

    /// Every file key under a prefix, markers included. Unlike the quota
    /// walk, enumeration failures here abort the whole operation.
    fn collect_keys(&self, prefix: String) -> BoxFuture<'_, Result<Vec<String>, AppError>> {
        async move {
            let listing = self.storage.list(&prefix).await.map_err(AppError::from)?;
            let mut keys = listing.files;
            for folder in listing.folders {
                keys.extend(self.collect_keys(folder).await?);
            }
            Ok(keys)
        }
        .boxed()
    }
}

fn parent_of(key: &str) -> String {
    match key.trim_end_matches('/').rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

fn leaf_of(key: &str) -> String {
    key.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(key)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediavault_core::AssetKind;
    use mediavault_storage::MemoryStorage;

    fn fixture() -> (Arc<MemoryStorage>, FileManager, String) {
        let storage = Arc::new(MemoryStorage::new());
        let user_id = Uuid::new_v4();
        let manager = FileManager::new(storage.clone(), user_id);
        let root = manager.root().to_string();
        (storage, manager, root)
    }

    async fn seed_file(storage: &MemoryStorage, key: &str, size: u64, content_type: &str) {
        storage.seed_object(key, size, content_type).await;
    }

    #[tokio::test]
    async fn test_escape_attempts_rejected_without_backend_calls() {
        let (storage, manager, root) = fixture();

        let outside = "users/someone-else/public_images/cat.png";
        assert!(matches!(
            manager.list(outside).await,
            Err(AppError::SecurityViolation(_))
        ));
        assert!(matches!(
            manager.create_folder(outside, "folder").await,
            Err(AppError::SecurityViolation(_))
        ));
        assert!(matches!(
            manager.rename(outside, "new").await,
            Err(AppError::SecurityViolation(_))
        ));
        assert!(matches!(
            manager.move_to(outside, &root).await,
            Err(AppError::SecurityViolation(_))
        ));
        assert!(matches!(
            manager.delete(outside, true).await,
            Err(AppError::SecurityViolation(_))
        ));
        // destination escapes even though the source is sandboxed
        assert!(matches!(
            manager
                .move_to(&format!("{}/a.png", root), "users/other/public_images")
                .await,
            Err(AppError::SecurityViolation(_))
        ));
        // traversal inside a sandboxed-looking path
        assert!(matches!(
            manager.list(&format!("{}/../../secrets", root)).await,
            Err(AppError::SecurityViolation(_))
        ));

        assert_eq!(storage.op_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_empty_sandbox() {
        let (_storage, manager, root) = fixture();
        let assets = manager.list(&root).await.unwrap();
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_folders_before_files() {
        let (storage, manager, root) = fixture();

        seed_file(&storage, &format!("{}/zebra.png", root), 3, "image/png").await;
        seed_file(&storage, &format!("{}/Apple/.keep", root), 0, "application/octet-stream").await;
        seed_file(&storage, &format!("{}/banana.jpg", root), 2, "image/jpeg").await;

        let assets = manager.list(&root).await.unwrap();
        let names: Vec<&str> = assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "banana.jpg", "zebra.png"]);
        assert_eq!(assets[0].kind, AssetKind::Folder);
        assert_eq!(assets[1].kind, AssetKind::File);
    }

    #[tokio::test]
    async fn test_list_hides_folder_markers() {
        let (storage, manager, root) = fixture();
        seed_file(&storage, &format!("{}/photos/.keep", root), 0, "application/octet-stream").await;

        let assets = manager.list(&format!("{}/photos", root)).await.unwrap();
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn test_create_folder_and_name_validation() {
        let (_storage, manager, root) = fixture();

        let folder = manager.create_folder(&root, "my-folder_2").await.unwrap();
        assert_eq!(folder.name, "my-folder_2");
        assert!(folder.is_folder());

        assert!(matches!(
            manager.create_folder(&root, "My Folder").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.create_folder(&root, &"a".repeat(51)).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            manager.create_folder(&root, ".hidden").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_created_folder_appears_in_listing() {
        let (_storage, manager, root) = fixture();
        manager.create_folder(&root, "photos").await.unwrap();

        let assets = manager.list(&root).await.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].name, "photos");
        assert!(assets[0].is_folder());
    }

    #[tokio::test]
    async fn test_rename_file() {
        let (storage, manager, root) = fixture();
        let old_key = format!("{}/old.png", root);
        seed_file(&storage, &old_key, 5, "image/png").await;

        let new_key = manager.rename(&old_key, "new.png").await.unwrap();
        assert_eq!(new_key, format!("{}/new.png", root));
        assert!(!storage.exists(&old_key).await.unwrap());
        assert!(storage.exists(&new_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_folder_relocates_descendants() {
        let (storage, manager, root) = fixture();
        seed_file(&storage, &format!("{}/photos/.keep", root), 0, "application/octet-stream").await;
        seed_file(&storage, &format!("{}/photos/a.png", root), 1, "image/png").await;
        seed_file(&storage, &format!("{}/photos/deep/b.png", root), 2, "image/png").await;

        let new_prefix = manager
            .rename(&format!("{}/photos", root), "archive")
            .await
            .unwrap();
        assert_eq!(new_prefix, format!("{}/archive", root));

        assert!(storage.exists(&format!("{}/archive/a.png", root)).await.unwrap());
        assert!(storage
            .exists(&format!("{}/archive/deep/b.png", root))
            .await
            .unwrap());
        assert!(!storage.exists(&format!("{}/photos/a.png", root)).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_rejects_bad_file_name() {
        let (storage, manager, root) = fixture();
        let key = format!("{}/a.png", root);
        seed_file(&storage, &key, 1, "image/png").await;

        assert!(matches!(
            manager.rename(&key, "bad name.png").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_move_file_into_folder() {
        let (storage, manager, root) = fixture();
        let key = format!("{}/a.png", root);
        seed_file(&storage, &key, 1, "image/png").await;
        seed_file(&storage, &format!("{}/photos/.keep", root), 0, "application/octet-stream").await;

        let new_key = manager
            .move_to(&key, &format!("{}/photos", root))
            .await
            .unwrap();
        assert_eq!(new_key, format!("{}/photos/a.png", root));
        assert!(storage.exists(&new_key).await.unwrap());
        assert!(!storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_move_folder_into_itself_rejected() {
        let (storage, manager, root) = fixture();
        seed_file(&storage, &format!("{}/photos/a.png", root), 1, "image/png").await;

        let result = manager
            .move_to(&format!("{}/photos", root), &format!("{}/photos", root))
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (storage, manager, root) = fixture();
        let key = format!("{}/a.png", root);
        seed_file(&storage, &key, 1, "image/png").await;

        manager.delete(&key, false).await.unwrap();
        assert!(!storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_nonempty_folder_requires_recursive() {
        let (storage, manager, root) = fixture();
        seed_file(&storage, &format!("{}/photos/a.png", root), 1, "image/png").await;

        let prefix = format!("{}/photos", root);
        assert!(matches!(
            manager.delete(&prefix, false).await,
            Err(AppError::InvalidInput(_))
        ));

        manager.delete(&prefix, true).await.unwrap();
        assert!(!storage.exists(&format!("{}/photos/a.png", root)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_empty_folder_without_recursive() {
        let (storage, manager, root) = fixture();
        seed_file(&storage, &format!("{}/photos/.keep", root), 0, "application/octet-stream").await;

        manager.delete(&format!("{}/photos", root), false).await.unwrap();
        assert!(!storage
            .exists(&format!("{}/photos/.keep", root))
            .await
            .unwrap());
    }

    #[test]
    fn test_parent_and_leaf_helpers() {
        assert_eq!(parent_of("a/b/c.png"), "a/b");
        assert_eq!(parent_of("solo"), "");
        assert_eq!(leaf_of("a/b/c.png"), "c.png");
        assert_eq!(leaf_of("a/b/"), "b");
    }
}
