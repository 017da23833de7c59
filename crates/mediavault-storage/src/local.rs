use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::traits::{Listing, ObjectMetadata, Storage, StorageError, StorageResult};
use crate::StorageBackend;

/// Suffix of the JSON sidecar that carries object metadata the filesystem
/// cannot store natively (content type, upload attributes).
const META_SUFFIX: &str = ".meta.json";

/// Local filesystem storage implementation
///
/// Objects are plain files under `base_path`; folders are real directories.
/// Each object has a `{key}.meta.json` sidecar holding its metadata.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g. "/var/lib/mediavault/objects")
    /// * `base_url` - Base URL for serving objects (e.g. "http://localhost:3000/objects")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert a storage key to a filesystem path with security validation.
    ///
    /// Keys containing traversal sequences, or resolving outside the base
    /// directory, are rejected before any filesystem access.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    fn meta_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(META_SUFFIX);
        path.with_file_name(name)
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn read_sidecar(&self, path: &Path) -> Option<ObjectMetadata> {
        let raw = fs::read(Self::meta_path(path)).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn list(&self, prefix: &str) -> StorageResult<Listing> {
        let dir = self.key_to_path(prefix)?;

        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Listing::default());
        }

        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::ListFailed(format!("{}: {}", dir.display(), e)))?;

        let mut listing = Listing::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::ListFailed(format!("{}: {}", dir.display(), e)))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(META_SUFFIX) {
                continue;
            }
            let key = format!("{}/{}", prefix.trim_end_matches('/'), name);
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StorageError::ListFailed(format!("{}: {}", name, e)))?;
            if file_type.is_dir() {
                listing.folders.push(key);
            } else {
                listing.files.push(key);
            }
        }

        Ok(listing)
    }

    async fn metadata(&self, key: &str) -> StorageResult<ObjectMetadata> {
        let path = self.key_to_path(key)?;

        let fs_meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::BackendError(format!("{}: {}", path.display(), e))
            }
        })?;

        match self.read_sidecar(&path).await {
            Some(mut meta) => {
                // The filesystem is authoritative for size.
                meta.size = fs_meta.len();
                Ok(meta)
            }
            None => Ok(ObjectMetadata {
                size: fs_meta.len(),
                content_type: "application/octet-stream".to_string(),
                created_at: fs_meta
                    .modified()
                    .map(chrono::DateTime::from)
                    .unwrap_or_else(|_| Utc::now()),
                custom: HashMap::new(),
            }),
        }
    }

    async fn download_url(&self, key: &str) -> StorageResult<String> {
        self.key_to_path(key)?;
        Ok(self.generate_url(key))
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        custom: &HashMap<String, String>,
    ) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        let meta = ObjectMetadata {
            size: size as u64,
            content_type: content_type.to_string(),
            created_at: Utc::now(),
            custom: custom.clone(),
        };
        let sidecar = serde_json::to_vec(&meta)
            .map_err(|e| StorageError::UploadFailed(format!("Failed to encode metadata: {}", e)))?;
        fs::write(Self::meta_path(&path), sidecar).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write metadata sidecar: {}", e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let from_path = self.key_to_path(from_key)?;
        let to_path = self.key_to_path(to_key)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from_key.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;

        fs::copy(&from_path, &to_path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to copy {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        let from_meta = Self::meta_path(&from_path);
        if fs::try_exists(&from_meta).await.unwrap_or(false) {
            fs::copy(&from_meta, Self::meta_path(&to_path))
                .await
                .map_err(|e| {
                    StorageError::BackendError(format!("Failed to copy metadata sidecar: {}", e))
                })?;
        }

        tracing::info!(
            from_key = %from_key,
            to_key = %to_key,
            "Local storage copy successful"
        );

        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        // Sidecar removal is best effort; a stale sidecar is harmless.
        let _ = fs::remove_file(Self::meta_path(&path)).await;

        // Prune directories the delete emptied, so a fully moved folder no
        // longer shows up in listings. remove_dir fails on non-empty
        // directories, which ends the walk.
        let mut current = path.parent().map(Path::to_path_buf);
        while let Some(dir) = current {
            if dir == self.base_path || fs::remove_dir(&dir).await.is_err() {
                break;
            }
            current = dir.parent().map(Path::to_path_buf);
        }

        tracing::info!(key = %key, "Local storage delete successful");

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
