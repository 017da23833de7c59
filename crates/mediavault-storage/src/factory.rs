#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-memory")]
use crate::MemoryStorage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use mediavault_core::Config;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend.unwrap_or(StorageBackend::Local);

    match backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-memory")]
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),

        #[cfg(not(feature = "storage-memory"))]
        StorageBackend::Memory => Err(StorageError::ConfigError(
            "Memory storage backend not available (storage-memory feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-memory"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_from_config() {
        let config = Config {
            storage_backend: Some(StorageBackend::Memory),
            ..Config::default()
        };
        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Memory);
    }

    #[tokio::test]
    async fn test_local_backend_requires_path() {
        let config = Config {
            storage_backend: Some(StorageBackend::Local),
            local_storage_path: None,
            ..Config::default()
        };
        assert!(create_storage(&config).await.is_err());
    }
}
