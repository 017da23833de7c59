//! Error types module
//!
//! This module provides the core error types used throughout the Mediavault
//! application. All errors are unified under the `AppError` enum, which covers
//! validation, quota, compression, sandbox, storage, and authentication
//! failures.
//!
//! Business logic returns `AppError` values and never talks to a presentation
//! layer directly; the `ErrorMetadata` trait is the adapter that callers use
//! to turn an error into something user-facing.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like resource limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error presentation.
///
/// Errors self-describe how they should surface: a machine-readable code, a
/// short client-facing message, whether retrying makes sense, and how loudly
/// to log. Technical detail is only included when `development` is set.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g. "QUOTA_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether the caller can retry with corrected input
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;

    /// Client-facing message. `development` enables technical detail.
    fn client_message(&self, development: bool) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Quota exceeded: {used} of {limit} bytes used, candidate {candidate} bytes")]
    QuotaExceeded { used: u64, limit: u64, candidate: u64 },

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Security violation: {0}")]
    SecurityViolation(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            AppError::CompressionFailed(_) => "COMPRESSION_FAILED",
            AppError::SecurityViolation(_) => "SECURITY_VIOLATION",
            AppError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AppError::VerificationFailed(_) => "VERIFICATION_FAILED",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        // InvalidInput, QuotaExceeded and SecurityViolation are rejected
        // before any I/O: the caller may retry immediately with corrected
        // input. Storage failures may be transient but leave ambiguous state.
        matches!(
            self,
            AppError::InvalidInput(_)
                | AppError::QuotaExceeded { .. }
                | AppError::SecurityViolation(_)
                | AppError::CompressionFailed(_)
        )
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::InvalidInput(_) | AppError::NotFound(_) => LogLevel::Debug,
            AppError::QuotaExceeded { .. }
            | AppError::CompressionFailed(_)
            | AppError::Unauthorized(_) => LogLevel::Warn,
            AppError::SecurityViolation(_)
            | AppError::StorageUnavailable(_)
            | AppError::VerificationFailed(_)
            | AppError::Internal(_) => LogLevel::Error,
        }
    }

    fn client_message(&self, development: bool) -> String {
        match self {
            AppError::InvalidInput(detail) => {
                if development {
                    format!("Invalid input: {}", detail)
                } else {
                    "The provided input is not valid.".to_string()
                }
            }
            // The quota message always names the configured limit and the
            // current usage so the user understands the numeric gap.
            AppError::QuotaExceeded {
                used,
                limit,
                candidate,
            } => format!(
                "Storage limit reached: {} of {} bytes in use; this upload needs {} more bytes.",
                used, limit, candidate
            ),
            AppError::CompressionFailed(detail) => {
                if development {
                    format!("Image compression failed: {}", detail)
                } else {
                    "The image could not be compressed.".to_string()
                }
            }
            AppError::SecurityViolation(_) => "This operation is not permitted.".to_string(),
            AppError::StorageUnavailable(detail) => {
                if development {
                    format!("Storage unavailable: {}", detail)
                } else {
                    "Storage is temporarily unavailable. Please try again.".to_string()
                }
            }
            AppError::VerificationFailed(detail) => {
                if development {
                    format!("Upload verification failed: {}", detail)
                } else {
                    "The upload could not be verified.".to_string()
                }
            }
            AppError::Unauthorized(_) => "You are not authorized to perform this action.".to_string(),
            AppError::NotFound(what) => format!("Not found: {}", what),
            AppError::Internal(detail) => {
                if development {
                    format!("Internal error: {}", detail)
                } else {
                    "Something went wrong. Please try again.".to_string()
                }
            }
        }
    }
}
