//! Domain models shared across Mediavault components.
//!
//! These are typed records with constructors that validate invariants at
//! creation time, so downstream layers never have to trust ad hoc maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Whether a stored asset is a file or a directory marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    File,
    Folder,
}

/// One entry in a tenant sandbox.
///
/// Invariants enforced by the constructors:
/// - `path` is non-empty and `name` is its leaf segment
/// - files carry a content type; folders never do
/// - folders have `size_bytes == 0` and no creation timestamp (they are
///   directory markers, not tracked entities)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub path: String,
    pub name: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub kind: AssetKind,
}

impl StoredAsset {
    pub fn file(
        path: impl Into<String>,
        size_bytes: u64,
        content_type: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let path = path.into();
        let content_type = content_type.into();
        let name = leaf_segment(&path)?;
        if content_type.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "file asset {} requires a content type",
                path
            )));
        }
        Ok(StoredAsset {
            path,
            name,
            size_bytes,
            content_type: Some(content_type),
            created_at: Some(created_at),
            kind: AssetKind::File,
        })
    }

    pub fn folder(path: impl Into<String>) -> Result<Self, AppError> {
        let path = path.into();
        let name = leaf_segment(&path)?;
        Ok(StoredAsset {
            path,
            name,
            size_bytes: 0,
            content_type: None,
            created_at: None,
            kind: AssetKind::Folder,
        })
    }

    pub fn is_folder(&self) -> bool {
        self.kind == AssetKind::Folder
    }
}

fn leaf_segment(path: &str) -> Result<String, AppError> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("asset path is empty".to_string()));
    }
    let leaf = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if leaf.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "asset path {} has no leaf segment",
            path
        )));
    }
    Ok(leaf.to_string())
}

/// Result of a full usage enumeration.
///
/// Subtrees whose enumeration failed contribute zero bytes and are listed in
/// `failed_subtrees`, so callers can decide whether to trust the number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageReport {
    pub used_bytes: u64,
    pub failed_subtrees: Vec<String>,
}

impl UsageReport {
    /// True when every subtree was enumerated successfully.
    pub fn is_exact(&self) -> bool {
        self.failed_subtrees.is_empty()
    }
}

/// Pure admission decision for a candidate upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub current_usage: u64,
    pub limit_bytes: u64,
    pub candidate_bytes: u64,
    pub reason: Option<String>,
    /// Subtrees that could not be enumerated; usage may be an undercount.
    pub failed_subtrees: Vec<String>,
}

impl QuotaDecision {
    pub fn evaluate(
        usage: UsageReport,
        candidate_bytes: u64,
        limit_bytes: u64,
    ) -> Self {
        let allowed = usage.used_bytes + candidate_bytes <= limit_bytes;
        let reason = if allowed {
            None
        } else {
            Some(format!(
                "{} of {} bytes in use; adding {} bytes would exceed the limit",
                usage.used_bytes, limit_bytes, candidate_bytes
            ))
        };
        QuotaDecision {
            allowed,
            current_usage: usage.used_bytes,
            limit_bytes,
            candidate_bytes,
            reason,
            failed_subtrees: usage.failed_subtrees,
        }
    }

    /// The denial as an `AppError`, for callers that treat it as a failure.
    pub fn denial(&self) -> Option<AppError> {
        if self.allowed {
            None
        } else {
            Some(AppError::QuotaExceeded {
                used: self.current_usage,
                limit: self.limit_bytes,
                candidate: self.candidate_bytes,
            })
        }
    }
}
