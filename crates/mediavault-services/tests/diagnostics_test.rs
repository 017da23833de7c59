//! Diagnostics battery behavior and severity aggregation.

use std::sync::Arc;

use uuid::Uuid;

use mediavault_services::{
    sandbox_root, DiagnosticsRunner, HealthStatus, MemoryStorage, StaticTokenVerifier, Storage,
};

fn runner_with_token(
    storage: Arc<MemoryStorage>,
    user_id: Uuid,
    token: &str,
) -> DiagnosticsRunner {
    let verifier = Arc::new(StaticTokenVerifier::new().with_token(token, user_id));
    DiagnosticsRunner::new(storage, verifier)
}

#[tokio::test]
async fn test_healthy_run_passes_every_check() {
    let storage = Arc::new(MemoryStorage::new());
    let user_id = Uuid::new_v4();
    storage
        .seed_object(
            &format!("{}/pic.png", sandbox_root(user_id)),
            42,
            "image/png",
        )
        .await;

    let runner = runner_with_token(storage, user_id, "good-token");
    let report = runner.run(user_id, "good-token").await;

    assert_eq!(report.failed, 0, "failures: {:?}", report.checks);
    assert_eq!(report.passed, report.checks.len());
    assert_eq!(report.status, HealthStatus::Healthy);

    let names: Vec<&str> = report.checks.iter().map(|c| c.name).collect();
    assert_eq!(
        names,
        vec![
            "authentication",
            "storage_access",
            "upload_pipeline",
            "data_association",
            "url_accessibility",
            "cache_freshness",
            "codec_support",
        ]
    );
}

#[tokio::test]
async fn test_upload_probe_cleans_up_after_itself() {
    let storage = Arc::new(MemoryStorage::new());
    let user_id = Uuid::new_v4();

    let runner = runner_with_token(storage.clone(), user_id, "good-token");
    runner.run(user_id, "good-token").await;

    let listing = storage
        .list(&format!("{}/diagnostics", sandbox_root(user_id)))
        .await
        .unwrap();
    assert!(listing.is_empty(), "probe object must be deleted");
}

#[tokio::test]
async fn test_bad_token_is_a_warning() {
    let storage = Arc::new(MemoryStorage::new());
    let user_id = Uuid::new_v4();

    let runner = runner_with_token(storage, user_id, "good-token");
    let report = runner.run(user_id, "wrong-token").await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.status, HealthStatus::Warning);
    let auth = report
        .checks
        .iter()
        .find(|c| c.name == "authentication")
        .unwrap();
    assert!(!auth.passed);
}

#[tokio::test]
async fn test_unreachable_storage_is_critical() {
    let storage = Arc::new(MemoryStorage::new());
    let user_id = Uuid::new_v4();
    storage.inject_list_failure(&sandbox_root(user_id)).await;

    let runner = runner_with_token(storage, user_id, "good-token");
    let report = runner.run(user_id, "good-token").await;

    assert!(report.failed > 2, "failures: {:?}", report.checks);
    assert_eq!(report.status, HealthStatus::Critical);
}

#[tokio::test]
async fn test_report_serializes() {
    let storage = Arc::new(MemoryStorage::new());
    let user_id = Uuid::new_v4();

    let runner = runner_with_token(storage, user_id, "good-token");
    let report = runner.run(user_id, "good-token").await;

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"status\""));
    assert!(json.contains("upload_pipeline"));
}
