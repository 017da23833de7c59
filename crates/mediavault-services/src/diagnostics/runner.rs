//! The diagnostics battery.
//!
//! A fixed set of independent checks that re-validate the pipeline from the
//! outside: token verification, storage reachability, a real upload/delete
//! round-trip, sandbox association of listed keys, URL accessibility,
//! metadata clock sanity, and codec availability. Every check is
//! side-effect-free except the upload probe, which writes and deletes one
//! small disposable object. Run on demand by an operator, never
//! automatically.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use mediavault_core::constants::FOLDER_MARKER;
use mediavault_core::TokenVerifier;
use mediavault_processing::{
    CompressionRequest, CompressionSettings, ImageCompressor, OutputFormat,
};
use mediavault_storage::{join_key, sandbox_root, Storage};

/// Tolerated clock skew, in minutes, before an object timestamp counts as
/// stale.
const MAX_TIMESTAMP_SKEW_MINUTES: i64 = 5;

const URL_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    pub message: String,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub ran_at: DateTime<Utc>,
    pub checks: Vec<CheckOutcome>,
    pub passed: usize,
    pub failed: usize,
    pub status: HealthStatus,
}

impl DiagnosticsReport {
    fn from_checks(checks: Vec<CheckOutcome>) -> Self {
        let passed = checks.iter().filter(|c| c.passed).count();
        let failed = checks.len() - passed;
        let status = match failed {
            0 => HealthStatus::Healthy,
            1..=2 => HealthStatus::Warning,
            _ => HealthStatus::Critical,
        };
        DiagnosticsReport {
            ran_at: Utc::now(),
            checks,
            passed,
            failed,
            status,
        }
    }
}

pub struct DiagnosticsRunner {
    storage: Arc<dyn Storage>,
    verifier: Arc<dyn TokenVerifier>,
    http: reqwest::Client,
}

impl DiagnosticsRunner {
    pub fn new(storage: Arc<dyn Storage>, verifier: Arc<dyn TokenVerifier>) -> Self {
        DiagnosticsRunner {
            storage,
            verifier,
            http: reqwest::Client::new(),
        }
    }

    /// Run the full battery for one user.
    pub async fn run(&self, user_id: Uuid, token: &str) -> DiagnosticsReport {
        let root = sandbox_root(user_id);

        let checks = vec![
            timed("authentication", self.check_authentication(user_id, token)).await,
            timed("storage_access", self.check_storage_access(&root)).await,
            timed("upload_pipeline", self.check_upload_pipeline(&root)).await,
            timed("data_association", self.check_data_association(&root)).await,
            timed("url_accessibility", self.check_url_accessibility(&root)).await,
            timed("cache_freshness", self.check_cache_freshness(&root)).await,
            timed("codec_support", self.check_codec_support()).await,
        ];

        let report = DiagnosticsReport::from_checks(checks);
        tracing::info!(
            user_id = %user_id,
            passed = report.passed,
            failed = report.failed,
            status = ?report.status,
            "Diagnostics run complete"
        );
        report
    }

    async fn check_authentication(&self, user_id: Uuid, token: &str) -> Result<String, String> {
        match self.verifier.verify(token) {
            Ok(resolved) if resolved == user_id => {
                Ok("token resolves to the expected user".to_string())
            }
            Ok(resolved) => Err(format!(
                "token resolves to {} instead of {}",
                resolved, user_id
            )),
            Err(e) => Err(format!("token verification failed: {}", e)),
        }
    }

    async fn check_storage_access(&self, root: &str) -> Result<String, String> {
        match self.storage.list(root).await {
            Ok(listing) => Ok(format!(
                "sandbox root listed: {} folders, {} files",
                listing.folders.len(),
                listing.files.len()
            )),
            Err(e) => Err(format!("sandbox root listing failed: {}", e)),
        }
    }

    /// The one check with side effects: a small disposable object is
    /// written, re-read, and deleted.
    async fn check_upload_pipeline(&self, root: &str) -> Result<String, String> {
        let key = join_key(&[
            root,
            "diagnostics",
            &format!("probe-{}.txt", Uuid::new_v4()),
        ]);
        let payload = b"mediavault diagnostics probe".to_vec();
        let payload_len = payload.len() as u64;

        self.storage
            .put(&key, payload, "text/plain", &HashMap::new())
            .await
            .map_err(|e| format!("probe write failed: {}", e))?;

        let verify = match self.storage.metadata(&key).await {
            Ok(meta) if meta.size == payload_len => Ok(()),
            Ok(meta) => Err(format!(
                "probe size mismatch: wrote {} bytes, read {}",
                payload_len, meta.size
            )),
            Err(e) => Err(format!("probe read-back failed: {}", e)),
        };

        // Delete regardless of the verification result.
        let cleanup = self.storage.delete(&key).await;

        verify?;
        cleanup.map_err(|e| format!("probe delete failed: {}", e))?;
        Ok("probe object written, verified and deleted".to_string())
    }

    async fn check_data_association(&self, root: &str) -> Result<String, String> {
        let listing = self
            .storage
            .list(root)
            .await
            .map_err(|e| format!("listing failed: {}", e))?;

        for key in listing.folders.iter().chain(listing.files.iter()) {
            if !key.starts_with(root) {
                return Err(format!(
                    "listing under {} returned foreign key {}",
                    root, key
                ));
            }
        }
        Ok(format!(
            "{} listed entries all belong to the sandbox",
            listing.folders.len() + listing.files.len()
        ))
    }

    async fn check_url_accessibility(&self, root: &str) -> Result<String, String> {
        let Some(key) = self.first_file(root).await? else {
            return Ok("no objects to probe".to_string());
        };

        let url = self
            .storage
            .download_url(&key)
            .await
            .map_err(|e| format!("no download URL for {}: {}", key, e))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Ok(format!("backend URLs are not HTTP ({}), skipping probe", url));
        }

        let response = self
            .http
            .head(&url)
            .timeout(URL_PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| format!("HEAD {} failed: {}", url, e))?;
        if response.status().is_success() {
            Ok(format!("HEAD {} returned {}", url, response.status()))
        } else {
            Err(format!("HEAD {} returned {}", url, response.status()))
        }
    }

    async fn check_cache_freshness(&self, root: &str) -> Result<String, String> {
        let Some(key) = self.first_file(root).await? else {
            return Ok("no objects to inspect".to_string());
        };

        let meta = self
            .storage
            .metadata(&key)
            .await
            .map_err(|e| format!("metadata read failed: {}", e))?;

        let now = Utc::now();
        if meta.created_at > now + chrono::Duration::minutes(MAX_TIMESTAMP_SKEW_MINUTES) {
            Err(format!(
                "object {} is timestamped {} which is ahead of local time {}",
                key, meta.created_at, now
            ))
        } else {
            Ok("object timestamps are within tolerance".to_string())
        }
    }

    async fn check_codec_support(&self) -> Result<String, String> {
        let source = tiny_png().map_err(|e| format!("failed to build probe image: {}", e))?;

        for format in [OutputFormat::WebP, OutputFormat::Jpeg, OutputFormat::Png] {
            let settings = CompressionSettings::new(80, 64, 64, format)
                .map_err(|e| format!("settings rejected: {}", e))?;
            let request = CompressionRequest::new(source.clone(), settings)
                .map_err(|e| format!("request rejected: {}", e))?;
            ImageCompressor::compress(&request)
                .map_err(|e| format!("{} encode failed: {}", format.extension(), e))?;
        }
        Ok("webp, jpeg and png encoders available".to_string())
    }

    async fn first_file(&self, root: &str) -> Result<Option<String>, String> {
        let listing = self
            .storage
            .list(root)
            .await
            .map_err(|e| format!("listing failed: {}", e))?;
        Ok(listing
            .files
            .into_iter()
            .find(|key| key.rsplit('/').next() != Some(FOLDER_MARKER)))
    }
}

async fn timed<F>(name: &'static str, check: F) -> CheckOutcome
where
    F: Future<Output = Result<String, String>>,
{
    let start = std::time::Instant::now();
    let outcome = check.await;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    match outcome {
        Ok(message) => CheckOutcome {
            name,
            passed: true,
            message,
            duration_ms,
        },
        Err(message) => CheckOutcome {
            name,
            passed: false,
            message,
            duration_ms,
        },
    }
}

fn tiny_png() -> Result<Bytes, String> {
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    let img = RgbaImage::from_pixel(4, 4, Rgba([120, 80, 40, 255]));
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(Bytes::from(buffer))
}
