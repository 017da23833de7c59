//! Mediavault Services Layer
//!
//! This crate is the **business service layer**: quota tracking, the upload
//! orchestrator, the sandboxed file manager, and the diagnostics battery.
//! It re-exports a unified API from core, processing, and storage so that
//! embedding applications depend on a single facade. Keep coordination
//! logic here; keep codecs and backends in their own crates.

pub mod diagnostics;
pub mod files;
pub mod quota;
pub mod telemetry;
pub mod upload;

pub use diagnostics::{CheckOutcome, DiagnosticsReport, DiagnosticsRunner, HealthStatus};
pub use telemetry::init_telemetry;
pub use files::FileManager;
pub use quota::QuotaTracker;
pub use upload::{CommitOutcome, SelectedFile, UploadOrchestrator, UploadPhase, UploadReceipt};

pub use mediavault_core::{
    AppError, AssetKind, Config, ErrorMetadata, JwtVerifier, QuotaDecision, StaticTokenVerifier,
    StoredAsset, TokenVerifier, UsageReport,
};
pub use mediavault_processing::{
    CompressionRequest, CompressionResult, CompressionSettings, ImageCompressor, ImageValidator,
    OutputFormat,
};
#[cfg(feature = "storage-local")]
pub use mediavault_storage::LocalStorage;
#[cfg(feature = "storage-memory")]
pub use mediavault_storage::MemoryStorage;
pub use mediavault_storage::{
    create_storage, sandbox_root, Storage, StorageBackend, StorageError, StorageResult,
};
