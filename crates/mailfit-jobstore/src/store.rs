//! Job record persistence over Postgres.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;
use uuid::Uuid;

use mailfit_models::{JobRecord, JobStatus, Provider, UploadId};

use crate::error::{JobStoreError, JobStoreResult};

/// Write interface for job lifecycle state.
///
/// Every call is one statement committed on its own; a connection is
/// checked out per call, never held across a transcode. The worker is the
/// only writer while a job is `processing`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Move the job to `processing` and seed progress at 1%, so the UI
    /// shows life before the first encoder tick.
    async fn mark_processing(&self, upload_id: &UploadId) -> JobStoreResult<()>;

    /// Persist a progress tick.
    async fn report_progress(&self, upload_id: &UploadId, percent: f64) -> JobStoreResult<()>;

    /// Terminal success write: `done`, progress 100, result location and
    /// retrieval URL, completion timestamp.
    async fn mark_done(
        &self,
        upload_id: &UploadId,
        output_key: &str,
        output_url: &str,
    ) -> JobStoreResult<()>;

    /// Terminal failure write: `error` plus a human-readable reason.
    async fn mark_error(&self, upload_id: &UploadId, message: &str) -> JobStoreResult<()>;

    /// Owner email, for when the queue snapshot carries none.
    async fn fetch_email(&self, upload_id: &UploadId) -> JobStoreResult<Option<String>>;

    /// Full record lookup.
    async fn fetch(&self, upload_id: &UploadId) -> JobStoreResult<Option<JobRecord>>;
}

/// Fields the producer supplies when creating a record at enqueue time.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub upload_id: UploadId,
    pub email: String,
    pub provider: Provider,
    pub priority: bool,
    pub transcript: bool,
    pub size_bytes: i64,
    pub duration_sec: f64,
    pub price_cents: i32,
    pub input_path: String,
    pub filename: Option<String>,
    pub token_used: Option<String>,
}

const JOB_COLUMNS: &str = "id, upload_id, email, provider, priority, transcript, size_bytes, \
     duration_sec, price_cents, status, progress, error, input_path, output_path, output_url, \
     filename, token_used, created_at, updated_at, completed_at";

/// Database shape of one row, converted into [`JobRecord`] at the edge.
#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    upload_id: String,
    email: String,
    provider: String,
    priority: bool,
    transcript: bool,
    size_bytes: i64,
    duration_sec: f64,
    price_cents: i32,
    status: String,
    progress: f64,
    error: Option<String>,
    input_path: String,
    output_path: Option<String>,
    output_url: Option<String>,
    filename: Option<String>,
    token_used: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = JobStoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e: mailfit_models::ParseStatusError| {
                JobStoreError::invalid_record(e.to_string())
            })?;
        // Unknown providers degrade rather than poison the record
        let provider: Provider = row.provider.parse().unwrap_or(Provider::Other);

        Ok(JobRecord {
            id: row.id,
            upload_id: UploadId::from_string(row.upload_id),
            email: row.email,
            provider,
            priority: row.priority,
            transcript: row.transcript,
            size_bytes: row.size_bytes,
            duration_sec: row.duration_sec,
            price_cents: row.price_cents,
            status,
            progress: row.progress,
            error: row.error,
            input_path: row.input_path,
            output_path: row.output_path,
            output_url: row.output_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
            filename: row.filename,
            token_used: row.token_used,
        })
    }
}

/// Postgres-backed job store.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    /// Connect with a small pool sized for per-statement checkouts.
    pub async fn connect(database_url: &str) -> JobStoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create from the `DATABASE_URL` environment variable.
    pub async fn from_env() -> JobStoreResult<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| JobStoreError::config_error("DATABASE_URL not set"))?;
        Self::connect(&url).await
    }

    /// Wrap an existing pool.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply embedded migrations.
    pub async fn migrate(&self) -> JobStoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Insert a freshly-enqueued job record (producer side).
    pub async fn create(&self, job: NewJob) -> JobStoreResult<JobRecord> {
        let id = Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO jobs (id, upload_id, email, provider, priority, transcript, \
             size_bytes, duration_sec, price_cents, status, progress, input_path, filename, token_used) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'queued', 0, $10, $11, $12) \
             RETURNING {JOB_COLUMNS}"
        );

        let row: JobRow = sqlx::query_as(&sql)
            .bind(&id)
            .bind(job.upload_id.as_str())
            .bind(&job.email)
            .bind(job.provider.as_str())
            .bind(job.priority)
            .bind(job.transcript)
            .bind(job.size_bytes)
            .bind(job.duration_sec)
            .bind(job.price_cents)
            .bind(&job.input_path)
            .bind(&job.filename)
            .bind(&job.token_used)
            .fetch_one(&self.pool)
            .await?;

        debug!("Created job record {}", job.upload_id);
        row.try_into()
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn mark_processing(&self, upload_id: &UploadId) -> JobStoreResult<()> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'processing', progress = 1, updated_at = NOW() \
             WHERE upload_id = $1",
        )
        .bind(upload_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("mark_processing matched no record for {}", upload_id);
        }
        Ok(())
    }

    async fn report_progress(&self, upload_id: &UploadId, percent: f64) -> JobStoreResult<()> {
        sqlx::query("UPDATE jobs SET progress = $2, updated_at = NOW() WHERE upload_id = $1")
            .bind(upload_id.as_str())
            .bind(percent)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_done(
        &self,
        upload_id: &UploadId,
        output_key: &str,
        output_url: &str,
    ) -> JobStoreResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'done', progress = 100, output_path = $2, \
             output_url = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE upload_id = $1",
        )
        .bind(upload_id.as_str())
        .bind(output_key)
        .bind(output_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_error(&self, upload_id: &UploadId, message: &str) -> JobStoreResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'error', error = $2, updated_at = NOW() \
             WHERE upload_id = $1",
        )
        .bind(upload_id.as_str())
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_email(&self, upload_id: &UploadId) -> JobStoreResult<Option<String>> {
        let email: Option<String> =
            sqlx::query_scalar("SELECT email FROM jobs WHERE upload_id = $1")
                .bind(upload_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(email)
    }

    async fn fetch(&self, upload_id: &UploadId) -> JobStoreResult<Option<JobRecord>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE upload_id = $1");
        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(upload_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(JobRecord::try_from).transpose()
    }
}
