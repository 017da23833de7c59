//! Mediavault Storage Library
//!
//! This crate provides the storage abstraction and backends for Mediavault.
//! It includes the `Storage` trait plus filesystem and in-memory
//! implementations.
//!
//! # Storage key format
//!
//! Keys are tenant-scoped. Every asset a user owns lives under their sandbox
//! root:
//!
//! - **Sandbox root**: `users/{user_id}/public_images`
//!
//! Keys must not contain `..` or a leading `/`. Sandbox construction and
//! validation are centralized in the `keys` module so every caller applies
//! the same rule.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{ensure_sandboxed, is_sandboxed, join_key, sandbox_root};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use mediavault_core::StorageBackend;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
pub use traits::{Listing, ObjectMetadata, Storage, StorageError, StorageResult};
