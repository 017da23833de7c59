//! Upload orchestration: validate → compress → quota re-check → (optional
//! size confirmation) → persist → verify.
//!
//! One `UploadOrchestrator` drives one upload attempt at a time as an
//! explicit state machine, independent of any UI. The embedding layer
//! renders the current phase and dispatches events; it never reaches into
//! the pipeline.
//!
//! Ordering within an attempt is fixed: compression strictly precedes the
//! precise quota check, which strictly precedes persistence, which strictly
//! precedes verification. Later steps depend on the authoritative outputs of
//! earlier ones (in particular the real compressed size), so these stages
//! are never reordered or run concurrently.
//!
//! There is no cancellation token: dropping the orchestrator mid-flight does
//! not abort an in-progress write.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use mediavault_core::constants::PRE_COMPRESSION_ESTIMATE;
use mediavault_core::{AppError, Config};
use mediavault_processing::{
    strip_exif, CompressionRequest, CompressionResult, CompressionSettings, ImageCompressor,
    ImageValidator,
};
use mediavault_storage::{ensure_sandboxed, join_key, sandbox_root, Storage};

use crate::quota::QuotaTracker;

/// Phases of one upload attempt.
///
/// `Persisting` is deliberately indeterminate: the underlying write is
/// atomic, so there is no true byte-level progress to report and none is
/// fabricated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    FileSelected,
    PreviewCompressing,
    PreviewReady,
    CommitCompressing,
    SizeConfirmationPending,
    Persisting,
    Verifying,
    Done,
    QuotaExceeded,
    Failed,
}

/// The source file a user picked, frozen at selection time.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
    /// Unix timestamp taken at selection; part of the destination key.
    pub selected_at: i64,
}

/// What a completed upload produced.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub key: String,
    pub url: String,
    pub size_bytes: u64,
    pub original_size: u64,
    pub ratio_percent: f64,
}

/// Result of a commit attempt that did not fail outright.
#[derive(Debug)]
pub enum CommitOutcome {
    Completed(UploadReceipt),
    /// The artifact came out larger than the source; an explicit
    /// `confirm_larger` or `cancel_larger` is required.
    AwaitingConfirmation {
        compressed_size: u64,
        original_size: u64,
    },
}

pub struct UploadOrchestrator {
    storage: Arc<dyn Storage>,
    quota: QuotaTracker,
    user_id: Uuid,
    root: String,
    limit_bytes: u64,
    validator: ImageValidator,
    settings: CompressionSettings,
    /// Subfolder within the sandbox that uploads land in ("" = root).
    current_path: String,
    phase: UploadPhase,
    phase_tx: watch::Sender<UploadPhase>,
    selected: Option<SelectedFile>,
    preview: Option<CompressionResult>,
    pending_commit: Option<CompressionResult>,
}

impl UploadOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        user_id: Uuid,
        limit_bytes: u64,
        config: &Config,
    ) -> Self {
        let (phase_tx, _) = watch::channel(UploadPhase::Idle);
        UploadOrchestrator {
            quota: QuotaTracker::new(storage.clone()),
            storage,
            user_id,
            root: sandbox_root(user_id),
            limit_bytes,
            validator: ImageValidator::new(
                config.max_upload_bytes,
                config.allowed_extensions.clone(),
                config.allowed_content_types.clone(),
            ),
            settings: CompressionSettings::default(),
            current_path: String::new(),
            phase: UploadPhase::Idle,
            phase_tx,
            selected: None,
            preview: None,
            pending_commit: None,
        }
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    /// Observe phase transitions, e.g. to drive a progress indicator.
    pub fn subscribe(&self) -> watch::Receiver<UploadPhase> {
        self.phase_tx.subscribe()
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    /// The most recent trial encode, if settings have not changed since.
    pub fn preview_result(&self) -> Option<&CompressionResult> {
        self.preview.as_ref()
    }

    pub fn settings(&self) -> CompressionSettings {
        self.settings
    }

    /// Point subsequent uploads at a subfolder of the sandbox. The full
    /// destination is re-validated against the sandbox at persist time.
    pub fn set_current_path(&mut self, path: &str) -> Result<(), AppError> {
        if path.contains("..") || path.starts_with('/') || path.contains('\\') {
            return Err(AppError::SecurityViolation(format!(
                "upload path {:?} is not a sandbox-relative folder",
                path
            )));
        }
        self.current_path = path.trim_matches('/').to_string();
        Ok(())
    }

    /// Drop all attempt state and return to `Idle`.
    pub fn reset(&mut self) {
        self.selected = None;
        self.preview = None;
        self.pending_commit = None;
        self.set_phase(UploadPhase::Idle);
    }

    /// Select a source file. Validates type and size, then runs an estimated
    /// quota check (compressed output is assumed to be ~80% of the source;
    /// the real size is re-checked at commit time). Any violation returns to
    /// `Idle` with no partial state retained.
    pub async fn select_file(
        &mut self,
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: Bytes,
    ) -> Result<(), AppError> {
        let name = name.into();
        let content_type = content_type.into();

        self.reset();

        self.validator
            .validate_all(&name, &content_type, data.len())
            .map_err(AppError::from)?;

        let estimate = (data.len() as f64 * PRE_COMPRESSION_ESTIMATE) as u64;
        let decision = self
            .quota
            .can_upload(self.user_id, estimate, self.limit_bytes)
            .await?;
        if let Some(denial) = decision.denial() {
            return Err(denial);
        }

        self.selected = Some(SelectedFile {
            name,
            content_type,
            data,
            selected_at: Utc::now().timestamp(),
        });
        self.set_phase(UploadPhase::FileSelected);
        Ok(())
    }

    /// Change compression settings while a file is selected. Invalidates the
    /// current preview.
    pub fn update_settings(&mut self, settings: CompressionSettings) -> Result<(), AppError> {
        if self.selected.is_none() {
            return Err(AppError::InvalidInput(
                "no file selected".to_string(),
            ));
        }
        self.settings = settings;
        self.preview = None;
        self.pending_commit = None;
        self.set_phase(UploadPhase::FileSelected);
        Ok(())
    }

    /// Trial encode with the current settings. The preview is for display
    /// only; committing re-encodes from the source.
    pub async fn preview(&mut self) -> Result<CompressionResult, AppError> {
        let source = self
            .selected
            .as_ref()
            .map(|file| file.data.clone())
            .ok_or_else(|| AppError::InvalidInput("no file selected".to_string()))?;

        self.set_phase(UploadPhase::PreviewCompressing);
        let request = CompressionRequest::new(source, self.settings).map_err(AppError::from)?;
        match ImageCompressor::compress(&request) {
            Ok(result) => {
                self.preview = Some(result.clone());
                self.set_phase(UploadPhase::PreviewReady);
                Ok(result)
            }
            Err(e) => {
                self.set_phase(UploadPhase::FileSelected);
                Err(e.into())
            }
        }
    }

    /// Commit the upload: fresh encode on the authoritative settings, precise
    /// quota re-check, then persistence and verification. Pauses in
    /// `SizeConfirmationPending` when the artifact is larger than the source
    /// but still fits the quota.
    pub async fn commit(&mut self) -> Result<CommitOutcome, AppError> {
        if self.phase != UploadPhase::PreviewReady {
            return Err(AppError::InvalidInput(format!(
                "cannot commit from phase {:?}",
                self.phase
            )));
        }
        let file = self
            .selected
            .clone()
            .ok_or_else(|| AppError::Internal("no selection in PreviewReady".to_string()))?;

        self.set_phase(UploadPhase::CommitCompressing);

        // Never reuse the preview artifact: settings may have changed since
        // it was produced, and the stored object must match the settings the
        // user committed.
        let source = strip_exif(&file.data);
        let result = CompressionRequest::new(Bytes::from(source), self.settings)
            .and_then(|request| ImageCompressor::compress(&request))
            .map_err(|e| {
                self.set_phase(UploadPhase::Failed);
                AppError::from(e)
            })?;

        let decision = match self
            .quota
            .can_upload(self.user_id, result.size_bytes, self.limit_bytes)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                self.set_phase(UploadPhase::Failed);
                return Err(e);
            }
        };
        if let Some(denial) = decision.denial() {
            // Terminal: compression happens before any persistence call, so
            // no partial write exists.
            self.set_phase(UploadPhase::QuotaExceeded);
            return Err(denial);
        }

        if result.larger_than_source {
            let outcome = CommitOutcome::AwaitingConfirmation {
                compressed_size: result.size_bytes,
                original_size: result.original_size,
            };
            self.pending_commit = Some(result);
            self.set_phase(UploadPhase::SizeConfirmationPending);
            return Ok(outcome);
        }

        let receipt = self.persist_and_verify(&file, result).await?;
        Ok(CommitOutcome::Completed(receipt))
    }

    /// Proceed with a larger-than-source artifact.
    pub async fn confirm_larger(&mut self) -> Result<UploadReceipt, AppError> {
        if self.phase != UploadPhase::SizeConfirmationPending {
            return Err(AppError::InvalidInput(format!(
                "no size confirmation pending in phase {:?}",
                self.phase
            )));
        }
        let result = self
            .pending_commit
            .take()
            .ok_or_else(|| AppError::Internal("no pending artifact".to_string()))?;
        let file = self
            .selected
            .clone()
            .ok_or_else(|| AppError::Internal("no selection while confirming".to_string()))?;

        self.persist_and_verify(&file, result).await
    }

    /// Decline a larger-than-source artifact. The selected file and settings
    /// stay intact; the attempt returns to `PreviewReady`.
    pub fn cancel_larger(&mut self) -> Result<(), AppError> {
        if self.phase != UploadPhase::SizeConfirmationPending {
            return Err(AppError::InvalidInput(format!(
                "no size confirmation pending in phase {:?}",
                self.phase
            )));
        }
        self.pending_commit = None;
        self.set_phase(UploadPhase::PreviewReady);
        Ok(())
    }

    async fn persist_and_verify(
        &mut self,
        file: &SelectedFile,
        result: CompressionResult,
    ) -> Result<UploadReceipt, AppError> {
        let key = match self.destination_key(file) {
            Ok(key) => key,
            Err(e) => {
                self.set_phase(UploadPhase::Failed);
                return Err(e);
            }
        };

        self.set_phase(UploadPhase::Persisting);

        let storage = self.storage.clone();
        let custom = self.upload_metadata(file, &result);
        if let Err(e) = storage
            .put(
                &key,
                result.data.to_vec(),
                self.settings.format().mime_type(),
                &custom,
            )
            .await
        {
            self.set_phase(UploadPhase::Failed);
            // The write may or may not have landed; a later usage
            // recomputation can reveal an orphaned object.
            return Err(AppError::StorageUnavailable(format!(
                "persist failed for {}: {}",
                key, e
            )));
        }

        self.set_phase(UploadPhase::Verifying);

        let verified = storage.metadata(&key).await.map_err(|e| {
            self.set_phase(UploadPhase::Failed);
            AppError::VerificationFailed(format!("post-write read of {} failed: {}", key, e))
        })?;
        let url = storage.download_url(&key).await.map_err(|e| {
            self.set_phase(UploadPhase::Failed);
            AppError::VerificationFailed(format!("no download URL for {}: {}", key, e))
        })?;

        tracing::info!(
            key = %key,
            size_bytes = verified.size,
            original_size = result.original_size,
            ratio_percent = result.ratio_percent,
            "Upload complete"
        );

        self.set_phase(UploadPhase::Done);

        // Refresh usage in the background; success does not wait on it.
        let tracker = self.quota.clone();
        let user_id = self.user_id;
        tokio::spawn(async move {
            match tracker.compute_usage(user_id).await {
                Ok(report) => tracing::debug!(
                    user_id = %user_id,
                    used_bytes = report.used_bytes,
                    "Post-upload usage refreshed"
                ),
                Err(e) => tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Post-upload usage refresh failed"
                ),
            }
        });

        Ok(UploadReceipt {
            key,
            url,
            size_bytes: result.size_bytes,
            original_size: result.original_size,
            ratio_percent: result.ratio_percent,
        })
    }

    /// Destination key: `{root}/{current_path}/{stem}-{unix_ts}.{ext}`,
    /// validated against the sandbox immediately before use. This is the
    /// last line of defense should `current_path` have been tampered with.
    fn destination_key(&self, file: &SelectedFile) -> Result<String, AppError> {
        let stem = sanitize_stem(&file.name);
        let filename = format!(
            "{}-{}.{}",
            stem,
            file.selected_at,
            self.settings.format().extension()
        );
        let key = join_key(&[&self.root, &self.current_path, &filename]);
        ensure_sandboxed(&key, &self.root).map_err(|_| {
            AppError::SecurityViolation(format!("destination {:?} escapes the sandbox", key))
        })?;
        Ok(key)
    }

    fn upload_metadata(
        &self,
        file: &SelectedFile,
        result: &CompressionResult,
    ) -> HashMap<String, String> {
        let mut custom = HashMap::new();
        custom.insert("original_name".to_string(), file.name.clone());
        custom.insert(
            "original_size".to_string(),
            result.original_size.to_string(),
        );
        custom.insert("compressed_size".to_string(), result.size_bytes.to_string());
        custom.insert(
            "compression_ratio".to_string(),
            format!("{:.2}", result.ratio_percent),
        );
        custom.insert("quality".to_string(), self.settings.quality().to_string());
        custom.insert(
            "max_width".to_string(),
            self.settings.max_width().to_string(),
        );
        custom.insert(
            "max_height".to_string(),
            self.settings.max_height().to_string(),
        );
        custom.insert("uploaded_by".to_string(), self.user_id.to_string());
        custom.insert("uploaded_at".to_string(), Utc::now().to_rfc3339());
        custom
    }

    fn set_phase(&mut self, phase: UploadPhase) {
        self.phase = phase;
        let _ = self.phase_tx.send(phase);
    }
}

/// Reduce an original filename to a safe key stem: the basename without its
/// extension, restricted to `[A-Za-z0-9_-]`, truncated to 64 chars.
fn sanitize_stem(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let stem = match base.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => base,
    };
    let cleaned: String = stem
        .chars()
        .take(64)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("cat.png"), "cat");
        assert_eq!(sanitize_stem("my photo (1).jpeg"), "my_photo__1_");
        assert_eq!(sanitize_stem("../../evil.png"), "evil");
        assert_eq!(sanitize_stem("..png"), "_");
        assert_eq!(sanitize_stem("noext"), "noext");
        assert_eq!(sanitize_stem(""), "image");
        assert_eq!(sanitize_stem(&"x".repeat(200)).len(), 64);
    }
}
