//! Usage enumeration and upload admission.
//!
//! Usage is recomputed on demand by walking the user's sandbox; there is no
//! persisted running counter to drift out of sync. Subtree enumeration is
//! best effort: a failing subtree contributes zero bytes and is reported in
//! the result, while a failing root enumeration is a hard error.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use uuid::Uuid;

use mediavault_core::constants::FOLDER_MARKER;
use mediavault_core::{AppError, QuotaDecision, UsageReport};
use mediavault_storage::{sandbox_root, Listing, Storage};

#[derive(Clone)]
pub struct QuotaTracker {
    storage: Arc<dyn Storage>,
}

impl QuotaTracker {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Sum the sizes of every file under the user's sandbox root.
    ///
    /// Folder markers are excluded. Fails only when the root enumeration
    /// itself fails; deeper failures are collected in the report.
    pub async fn compute_usage(&self, user_id: Uuid) -> Result<UsageReport, AppError> {
        let root = sandbox_root(user_id);

        let listing = self.storage.list(&root).await.map_err(|e| {
            AppError::StorageUnavailable(format!("failed to enumerate {}: {}", root, e))
        })?;

        let mut report = UsageReport::default();
        self.sum_listing(listing, &mut report).await;

        tracing::debug!(
            user_id = %user_id,
            used_bytes = report.used_bytes,
            failed_subtrees = report.failed_subtrees.len(),
            "Usage computed"
        );

        Ok(report)
    }

    /// Pure admission decision for a candidate upload. Never mutates state,
    /// safe to call twice within one upload (estimate, then precise).
    pub async fn can_upload(
        &self,
        user_id: Uuid,
        candidate_bytes: u64,
        limit_bytes: u64,
    ) -> Result<QuotaDecision, AppError> {
        let usage = self.compute_usage(user_id).await?;
        Ok(QuotaDecision::evaluate(usage, candidate_bytes, limit_bytes))
    }

    fn sum_listing<'a>(
        &'a self,
        listing: Listing,
        report: &'a mut UsageReport,
    ) -> BoxFuture<'a, ()> {
        async move {
            for key in listing.files {
                if key.rsplit('/').next() == Some(FOLDER_MARKER) {
                    continue;
                }
                match self.storage.metadata(&key).await {
                    Ok(meta) => report.used_bytes += meta.size,
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Skipping unreadable object in usage sum");
                        report.failed_subtrees.push(key);
                    }
                }
            }
            for folder in listing.folders {
                match self.storage.list(&folder).await {
                    Ok(sub) => self.sum_listing(sub, report).await,
                    Err(e) => {
                        tracing::warn!(prefix = %folder, error = %e, "Skipping unreadable subtree in usage sum");
                        report.failed_subtrees.push(folder);
                    }
                }
            }
        }
        .boxed()
    }
}
