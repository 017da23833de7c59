//! Mediavault Core Library
//!
//! This crate provides the core domain models, error types, configuration,
//! and validation shared across all Mediavault components.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use auth::{JwtVerifier, StaticTokenVerifier, TokenVerifier};
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{AssetKind, QuotaDecision, StoredAsset, UsageReport};
pub use storage_types::StorageBackend;
