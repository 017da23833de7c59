//! Storage abstraction trait
//!
//! This module defines the `Storage` trait that all storage backends must
//! implement, along with the listing and metadata records they return.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use mediavault_core::StorageBackend;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Listing failed: {0}")]
    ListFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for mediavault_core::AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => mediavault_core::AppError::NotFound(key),
            StorageError::InvalidKey(detail) => {
                mediavault_core::AppError::SecurityViolation(detail)
            }
            other => mediavault_core::AppError::StorageUnavailable(other.to_string()),
        }
    }
}

/// One level of a prefix listing. Entries are full keys (files) or prefixes
/// without a trailing slash (folders), never URLs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub folders: Vec<String>,
    pub files: Vec<String>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }
}

/// Metadata of one stored object.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectMetadata {
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    /// Application-defined key/value pairs attached at upload time.
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

/// Storage abstraction trait
///
/// All storage backends (local filesystem, in-memory) must implement this
/// trait. The services layer works against it without coupling to backend
/// details.
///
/// **Key format:** keys are tenant-scoped, rooted at
/// `users/{user_id}/public_images`. See the crate root documentation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// List the immediate children of a prefix. A prefix with no children
    /// yields an empty listing, not an error.
    async fn list(&self, prefix: &str) -> StorageResult<Listing>;

    /// Fetch metadata for an object.
    async fn metadata(&self, key: &str) -> StorageResult<ObjectMetadata>;

    /// A URL under which the object can be fetched.
    async fn download_url(&self, key: &str) -> StorageResult<String>;

    /// Store an object, overwriting any previous object at the key.
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        custom: &HashMap<String, String>,
    ) -> StorageResult<()>;

    /// Copy an object to another key, metadata included.
    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
