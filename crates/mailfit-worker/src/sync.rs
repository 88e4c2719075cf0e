//! Job record synchronization policy.
//!
//! The store itself is dumb (one statement per call); this module owns the
//! policy around it: which progress samples get persisted, what is
//! best-effort, and which writes are worth retrying.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use mailfit_jobstore::{JobStore, JobStoreResult};
use mailfit_models::UploadId;

use crate::metrics;

/// Retry policy for terminal writes.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

/// Decides which raw progress samples are worth a database write.
///
/// Admitted samples are strictly increasing, and a sample must either
/// advance a whole step or arrive after the refresh interval. Everything
/// else is dropped; the next tick replaces it.
#[derive(Debug)]
pub struct ProgressGate {
    last_written: f64,
    last_write_at: Instant,
    min_step: f64,
    refresh: Duration,
}

impl ProgressGate {
    /// Gate seeded at `initial` percent with the standard policy: one
    /// whole point per write, or any advance after two seconds.
    pub fn new(initial: f64) -> Self {
        Self::with_policy(initial, 1.0, Duration::from_secs(2))
    }

    pub fn with_policy(initial: f64, min_step: f64, refresh: Duration) -> Self {
        Self {
            last_written: initial,
            last_write_at: Instant::now(),
            min_step,
            refresh,
        }
    }

    /// Whether `pct` should be persisted; records it as written if so.
    pub fn admit(&mut self, pct: f64) -> bool {
        if pct <= self.last_written {
            return false;
        }
        if pct - self.last_written >= self.min_step || self.last_write_at.elapsed() >= self.refresh
        {
            self.last_written = pct;
            self.last_write_at = Instant::now();
            return true;
        }
        false
    }
}

/// Policy wrapper around the job store.
///
/// Nothing here returns an error: a job that produced its artifact is done
/// whether or not the record heard about it, and a failed job is failed
/// whether or not the error write landed. Terminal writes are retried
/// because they are the ones users see; progress writes are droppable.
pub struct JobRecordSync {
    store: Arc<dyn JobStore>,
    retry: RetryConfig,
}

impl JobRecordSync {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Move the record to `processing` (progress seeded at 1%).
    pub async fn mark_processing(&self, upload_id: &UploadId) {
        if let Err(e) = self.store.mark_processing(upload_id).await {
            warn!("Failed to mark {} processing: {}", upload_id, e);
        }
    }

    /// Persist one admitted progress sample.
    pub async fn report_progress(&self, upload_id: &UploadId, percent: f64) {
        if let Err(e) = self.store.report_progress(upload_id, percent).await {
            debug!("Dropped progress write for {}: {}", upload_id, e);
        }
    }

    /// Terminal success write, retried with backoff.
    pub async fn mark_done(&self, upload_id: &UploadId, output_key: &str, output_url: &str) {
        self.retried_write("mark_done", upload_id, || {
            self.store.mark_done(upload_id, output_key, output_url)
        })
        .await;
    }

    /// Terminal failure write, retried with backoff.
    pub async fn mark_error(&self, upload_id: &UploadId, message: &str) {
        self.retried_write("mark_error", upload_id, || {
            self.store.mark_error(upload_id, message)
        })
        .await;
    }

    /// Owner email from the record; `None` on absence or store trouble.
    pub async fn fetch_email(&self, upload_id: &UploadId) -> Option<String> {
        match self.store.fetch_email(upload_id).await {
            Ok(email) => email,
            Err(e) => {
                warn!("Email lookup failed for {}: {}", upload_id, e);
                None
            }
        }
    }

    async fn retried_write<F, Fut>(&self, operation: &'static str, upload_id: &UploadId, op: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = JobStoreResult<()>>,
    {
        for attempt in 0..=self.retry.max_retries {
            match op().await {
                Ok(()) => return,
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = backoff_delay(&self.retry, attempt);
                    warn!(
                        "{} for {} failed (attempt {}), retrying in {}ms: {}",
                        operation,
                        upload_id,
                        attempt + 1,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(
                        "Giving up on {} for {} after {} attempts: {}",
                        operation,
                        upload_id,
                        self.retry.max_retries + 1,
                        e
                    );
                    metrics::record_terminal_write_failure(operation);
                }
            }
        }
    }
}

/// Exponential backoff with full jitter taken from the clock's nanoseconds.
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp_delay = config.base_delay_ms.saturating_mul(2u64.pow(attempt));
    let capped_delay = exp_delay.min(config.max_delay_ms);

    let jittered = if capped_delay > 0 {
        use std::time::SystemTime;
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let random_factor = (nanos % 1000) as f64 / 1000.0;
        (capped_delay as f64 * random_factor) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(config.base_delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailfit_jobstore::JobStoreError;
    use mailfit_models::JobRecord;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_gate_rejects_non_advancing_samples() {
        let mut gate = ProgressGate::with_policy(1.0, 1.0, Duration::from_secs(3600));

        assert!(!gate.admit(0.0));
        assert!(!gate.admit(1.0));
        assert!(gate.admit(50.0));
        assert!(!gate.admit(49.0));
        assert!(!gate.admit(50.0));
        assert!(gate.admit(51.0));
    }

    #[test]
    fn test_gate_requires_full_step_within_refresh_window() {
        let mut gate = ProgressGate::with_policy(1.0, 1.0, Duration::from_secs(3600));

        assert!(!gate.admit(1.5));
        assert!(gate.admit(2.0));
        assert!(!gate.admit(2.9));
        assert!(gate.admit(3.0));
    }

    #[test]
    fn test_gate_refresh_admits_small_advance() {
        // Zero refresh interval: any strictly-advancing sample passes
        let mut gate = ProgressGate::with_policy(1.0, 1.0, Duration::ZERO);

        assert!(gate.admit(1.1));
        assert!(gate.admit(1.2));
        assert!(!gate.admit(1.2));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        };

        for attempt in 0..8 {
            let delay = backoff_delay(&config, attempt);
            assert!(delay >= Duration::from_millis(config.base_delay_ms));
            assert!(delay <= Duration::from_millis(config.max_delay_ms));
        }
    }

    /// Store that fails a set number of times before accepting a write.
    struct FlakyStore {
        failures_left: AtomicU32,
        attempts: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                attempts: AtomicU32::new(0),
            }
        }

        fn attempt(&self) -> JobStoreResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                Err(JobStoreError::config_error("transient"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl JobStore for FlakyStore {
        async fn mark_processing(&self, _: &UploadId) -> JobStoreResult<()> {
            self.attempt()
        }
        async fn report_progress(&self, _: &UploadId, _: f64) -> JobStoreResult<()> {
            self.attempt()
        }
        async fn mark_done(&self, _: &UploadId, _: &str, _: &str) -> JobStoreResult<()> {
            self.attempt()
        }
        async fn mark_error(&self, _: &UploadId, _: &str) -> JobStoreResult<()> {
            self.attempt()
        }
        async fn fetch_email(&self, _: &UploadId) -> JobStoreResult<Option<String>> {
            Ok(None)
        }
        async fn fetch(&self, _: &UploadId) -> JobStoreResult<Option<JobRecord>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_terminal_write_retries_until_success() {
        let store = Arc::new(FlakyStore::new(2));
        let sync = JobRecordSync::new(store.clone()).with_retry(RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        });

        sync.mark_done(&UploadId::from_string("x"), "outputs/x.mp4", "https://dl")
            .await;
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_write_gives_up_quietly() {
        let store = Arc::new(FlakyStore::new(u32::MAX));
        let sync = JobRecordSync::new(store.clone()).with_retry(RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        });

        // Must return, not error or panic
        sync.mark_error(&UploadId::from_string("x"), "boom").await;
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }
}
