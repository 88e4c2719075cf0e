//! Job store integration tests against a live Postgres.

use mailfit_jobstore::{JobStore, NewJob, PgJobStore};
use mailfit_models::{JobStatus, Provider, UploadId};

fn new_job(upload_id: &UploadId) -> NewJob {
    NewJob {
        upload_id: upload_id.clone(),
        email: "user@example.com".to_string(),
        provider: Provider::Gmail,
        priority: false,
        transcript: false,
        size_bytes: 105_000_000,
        duration_sec: 45.0,
        price_cents: 199,
        input_path: format!("uploads/{}.mp4", upload_id),
        filename: Some("holiday.mp4".to_string()),
        token_used: None,
    }
}

/// Full lifecycle: create, processing, progress ticks, done.
#[tokio::test]
#[ignore = "requires Postgres"]
async fn test_job_lifecycle() {
    dotenvy::dotenv().ok();

    let store = PgJobStore::from_env().await.expect("Failed to connect");
    store.migrate().await.expect("Failed to migrate");

    let upload_id = UploadId::new();
    let created = store
        .create(new_job(&upload_id))
        .await
        .expect("Failed to create");
    assert_eq!(created.status, JobStatus::Queued);
    assert_eq!(created.progress, 0.0);

    store
        .mark_processing(&upload_id)
        .await
        .expect("Failed to mark processing");
    let record = store.fetch(&upload_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Processing);
    assert_eq!(record.progress, 1.0);

    store
        .report_progress(&upload_id, 42.5)
        .await
        .expect("Failed to report progress");
    let record = store.fetch(&upload_id).await.unwrap().unwrap();
    assert_eq!(record.progress, 42.5);

    store
        .mark_done(&upload_id, "outputs/x_compressed.mp4", "https://example.com/dl")
        .await
        .expect("Failed to mark done");
    let record = store.fetch(&upload_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Done);
    assert_eq!(record.progress, 100.0);
    assert_eq!(record.output_path.as_deref(), Some("outputs/x_compressed.mp4"));
    assert_eq!(record.output_url.as_deref(), Some("https://example.com/dl"));
    assert!(record.completed_at.is_some());
}

/// Error path and email lookup.
#[tokio::test]
#[ignore = "requires Postgres"]
async fn test_mark_error_and_fetch_email() {
    dotenvy::dotenv().ok();

    let store = PgJobStore::from_env().await.expect("Failed to connect");
    store.migrate().await.expect("Failed to migrate");

    let upload_id = UploadId::new();
    store
        .create(new_job(&upload_id))
        .await
        .expect("Failed to create");

    store
        .mark_error(&upload_id, "Download failed: object not found")
        .await
        .expect("Failed to mark error");

    let record = store.fetch(&upload_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert_eq!(
        record.error.as_deref(),
        Some("Download failed: object not found")
    );

    let email = store.fetch_email(&upload_id).await.expect("Failed to fetch");
    assert_eq!(email.as_deref(), Some("user@example.com"));

    let missing = store
        .fetch_email(&UploadId::new())
        .await
        .expect("Failed to fetch");
    assert!(missing.is_none());
}

/// Writes against an unknown upload id succeed without touching anything.
#[tokio::test]
#[ignore = "requires Postgres"]
async fn test_writes_to_missing_record_are_noops() {
    dotenvy::dotenv().ok();

    let store = PgJobStore::from_env().await.expect("Failed to connect");
    store.migrate().await.expect("Failed to migrate");

    let ghost = UploadId::new();
    store.mark_processing(&ghost).await.expect("should not fail");
    store.report_progress(&ghost, 50.0).await.expect("should not fail");
    store.mark_error(&ghost, "boom").await.expect("should not fail");
    assert!(store.fetch(&ghost).await.unwrap().is_none());
}
