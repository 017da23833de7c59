//! In-memory storage backend.
//!
//! Holds every object in a process-local map. Used by the test suites, which
//! also rely on its operation log to assert that rejected operations issued
//! zero backend calls, and on failure injection to exercise partial
//! enumeration behavior.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::traits::{Listing, ObjectMetadata, Storage, StorageError, StorageResult};
use crate::StorageBackend;

#[derive(Debug, Clone)]
struct ObjectRecord {
    data: Bytes,
    meta: ObjectMetadata,
}

/// In-memory storage implementation
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<BTreeMap<String, ObjectRecord>>,
    ops: Mutex<Vec<String>>,
    fail_list_prefixes: RwLock<Vec<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every backend call recorded so far, in order, as "op key" strings.
    pub async fn ops(&self) -> Vec<String> {
        self.ops.lock().await.clone()
    }

    /// Number of backend calls recorded so far.
    pub async fn op_count(&self) -> usize {
        self.ops.lock().await.len()
    }

    /// Insert an object with a declared size and no payload. Lets quota
    /// tests describe large sandboxes without allocating the bytes.
    pub async fn seed_object(&self, key: &str, size: u64, content_type: &str) {
        let record = ObjectRecord {
            data: Bytes::new(),
            meta: ObjectMetadata {
                size,
                content_type: content_type.to_string(),
                created_at: Utc::now(),
                custom: HashMap::new(),
            },
        };
        self.objects.write().await.insert(key.to_string(), record);
    }

    /// Make `list` fail for the given prefix and everything beneath it.
    pub async fn inject_list_failure(&self, prefix: &str) {
        self.fail_list_prefixes
            .write()
            .await
            .push(prefix.to_string());
    }

    /// Raw object bytes, for test assertions.
    pub async fn object_bytes(&self, key: &str) -> Option<Bytes> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|record| record.data.clone())
    }

    async fn record(&self, op: &str, key: &str) {
        self.ops.lock().await.push(format!("{} {}", op, key));
    }

    fn validate_key(key: &str) -> StorageResult<()> {
        if key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list(&self, prefix: &str) -> StorageResult<Listing> {
        Self::validate_key(prefix)?;
        self.record("list", prefix).await;

        for failing in self.fail_list_prefixes.read().await.iter() {
            if prefix == failing || prefix.starts_with(&format!("{}/", failing)) {
                return Err(StorageError::ListFailed(format!(
                    "injected failure for {}",
                    prefix
                )));
            }
        }

        let normalized = format!("{}/", prefix.trim_end_matches('/'));
        let objects = self.objects.read().await;

        let mut listing = Listing::default();
        let mut seen_folders: Vec<String> = Vec::new();
        for key in objects.keys() {
            let Some(rest) = key.strip_prefix(&normalized) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    let folder = format!("{}{}", normalized, child);
                    if !seen_folders.contains(&folder) {
                        seen_folders.push(folder);
                    }
                }
                None => listing.files.push(key.clone()),
            }
        }
        listing.folders = seen_folders;

        Ok(listing)
    }

    async fn metadata(&self, key: &str) -> StorageResult<ObjectMetadata> {
        Self::validate_key(key)?;
        self.record("metadata", key).await;

        self.objects
            .read()
            .await
            .get(key)
            .map(|record| record.meta.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn download_url(&self, key: &str) -> StorageResult<String> {
        Self::validate_key(key)?;
        self.record("download_url", key).await;
        Ok(format!("memory://{}", key))
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        custom: &HashMap<String, String>,
    ) -> StorageResult<()> {
        Self::validate_key(key)?;
        self.record("put", key).await;

        let record = ObjectRecord {
            meta: ObjectMetadata {
                size: data.len() as u64,
                content_type: content_type.to_string(),
                created_at: Utc::now(),
                custom: custom.clone(),
            },
            data: Bytes::from(data),
        };
        self.objects.write().await.insert(key.to_string(), record);
        Ok(())
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        Self::validate_key(from_key)?;
        Self::validate_key(to_key)?;
        self.record("copy", to_key).await;

        let mut objects = self.objects.write().await;
        let record = objects
            .get(from_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(from_key.to_string()))?;
        objects.insert(to_key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        Self::validate_key(key)?;
        self.record("delete", key).await;
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Self::validate_key(key)?;
        self.record("exists", key).await;
        Ok(self.objects.read().await.contains_key(key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_list_direct_children() {
        let storage = MemoryStorage::new();
        let custom = HashMap::new();

        storage
            .put("root/a.png", b"a".to_vec(), "image/png", &custom)
            .await
            .unwrap();
        storage
            .put("root/sub/b.png", b"b".to_vec(), "image/png", &custom)
            .await
            .unwrap();
        storage
            .put("root/sub/deep/c.png", b"c".to_vec(), "image/png", &custom)
            .await
            .unwrap();

        let listing = storage.list("root").await.unwrap();
        assert_eq!(listing.files, vec!["root/a.png"]);
        assert_eq!(listing.folders, vec!["root/sub"]);

        let sub = storage.list("root/sub").await.unwrap();
        assert_eq!(sub.files, vec!["root/sub/b.png"]);
        assert_eq!(sub.folders, vec!["root/sub/deep"]);
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let storage = MemoryStorage::new();
        let listing = storage.list("nothing/here").await.unwrap();
        assert!(listing.is_empty());
    }

    #[tokio::test]
    async fn test_op_log_records_calls() {
        let storage = MemoryStorage::new();
        let custom = HashMap::new();

        storage
            .put("root/a.png", b"a".to_vec(), "image/png", &custom)
            .await
            .unwrap();
        storage.delete("root/a.png").await.unwrap();

        let ops = storage.ops().await;
        assert_eq!(ops, vec!["put root/a.png", "delete root/a.png"]);
    }

    #[tokio::test]
    async fn test_seeded_object_reports_declared_size() {
        let storage = MemoryStorage::new();
        storage.seed_object("root/big.bin", 104_000_000, "application/octet-stream").await;

        let meta = storage.metadata("root/big.bin").await.unwrap();
        assert_eq!(meta.size, 104_000_000);
    }

    #[tokio::test]
    async fn test_injected_list_failure() {
        let storage = MemoryStorage::new();
        storage.inject_list_failure("root/broken").await;

        assert!(storage.list("root/broken").await.is_err());
        assert!(storage.list("root/broken/deep").await.is_err());
        assert!(storage.list("root/ok").await.is_ok());
    }

    #[tokio::test]
    async fn test_copy_preserves_metadata() {
        let storage = MemoryStorage::new();
        let mut custom = HashMap::new();
        custom.insert("quality".to_string(), "75".to_string());

        storage
            .put("root/a.png", b"abc".to_vec(), "image/png", &custom)
            .await
            .unwrap();
        storage.copy("root/a.png", "root/b.png").await.unwrap();

        let meta = storage.metadata("root/b.png").await.unwrap();
        assert_eq!(meta.size, 3);
        assert_eq!(meta.custom.get("quality").unwrap(), "75");
    }

    #[tokio::test]
    async fn test_traversal_key_rejected() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.list("../escape").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
