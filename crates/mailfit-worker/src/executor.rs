//! The consume-process-cleanup loop.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use mailfit_jobstore::JobStore;
use mailfit_media::Transcoder;
use mailfit_notify::Notifier;
use mailfit_queue::{CompressMessage, JobSource};
use mailfit_storage::ObjectStore;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics;
use crate::pipeline::JobPipeline;
use crate::scratch::ScratchSpace;
use crate::sync::JobRecordSync;
use crate::transfer::ArtifactTransfer;

/// External collaborators, constructed once at startup and injected.
pub struct WorkerDeps {
    pub queue: Arc<dyn JobSource>,
    pub jobs: Arc<dyn JobStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub notifier: Arc<dyn Notifier>,
}

/// Single-job consumer loop.
///
/// One message at a time: pop, process, clean up, repeat. A failed job is
/// written to its record and never escapes the loop; only a shutdown
/// signal ends it, and an in-flight job always runs to completion first.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<dyn JobSource>,
    sync: Arc<JobRecordSync>,
    pipeline: JobPipeline,
    scratch: ScratchSpace,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Wire the pipeline together. Creates the scratch root on disk.
    pub fn new(config: WorkerConfig, deps: WorkerDeps) -> WorkerResult<Self> {
        let scratch = ScratchSpace::new(config.scratch_dir.clone(), config.scratch_retention)?;
        let sync = Arc::new(JobRecordSync::new(deps.jobs));
        let transfer = ArtifactTransfer::new(deps.objects, scratch.clone(), config.url_ttl);
        let pipeline = JobPipeline::new(
            Arc::clone(&sync),
            transfer,
            deps.transcoder,
            deps.notifier,
            scratch.clone(),
            config.planner.clone(),
        );
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Ok(Self {
            config,
            queue: deps.queue,
            sync,
            pipeline,
            scratch,
            shutdown,
            consumer_name,
        })
    }

    /// Signal the loop to stop once the in-flight job, if any, finishes.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' (scratch {}, poll {}s)",
            self.consumer_name,
            self.scratch.root().display(),
            self.config.poll_timeout.as_secs()
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping consumer loop");
                        break;
                    }
                }
                popped = self.queue.pop(self.config.poll_timeout) => {
                    match popped {
                        Ok(Some(message)) => {
                            self.handle_message(message).await;
                            self.gauge_queue_depth().await;
                        }
                        Ok(None) => {
                            tokio::time::sleep(self.config.idle_sleep).await;
                        }
                        Err(e) => {
                            error!("Queue pop failed: {}", e);
                            tokio::time::sleep(self.config.error_backoff).await;
                        }
                    }
                }
            }
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Process one message; its failure never escapes the loop.
    async fn handle_message(&self, message: CompressMessage) {
        metrics::record_job_consumed();
        let started = Instant::now();
        let upload_id = message.upload_id.clone();

        info!(
            upload_id = %upload_id,
            "Picked job: {} bytes, {:.1}s, {}",
            message.size_bytes,
            message.duration_sec,
            message.provider
        );

        let email = self.resolve_email(&message).await;

        match self.pipeline.process(&message, &email).await {
            Ok(_url) => {
                let elapsed = started.elapsed().as_secs_f64();
                metrics::record_job_completed(elapsed);
                info!(upload_id = %upload_id, "Job completed in {:.1}s", elapsed);
            }
            Err(e) => {
                error!(upload_id = %upload_id, "Job failed: {}", e);
                self.sync.mark_error(&upload_id, &e.to_string()).await;
                metrics::record_job_failed(started.elapsed().as_secs_f64());
            }
        }

        // Success or failure, this job's scratch files go now; then sweep
        // anything a crashed run left past the retention window.
        self.scratch.cleanup_job(&upload_id).await;
        self.scratch.sweep_stale().await;
    }

    /// Snapshot email, then the live record, then the configured sentinel.
    async fn resolve_email(&self, message: &CompressMessage) -> String {
        let snapshot = message.email.trim();
        if !snapshot.is_empty() {
            return snapshot.to_string();
        }

        if let Some(live) = self.sync.fetch_email(&message.upload_id).await {
            let live = live.trim();
            if !live.is_empty() {
                return live.to_string();
            }
        }

        self.config.fallback_email.clone()
    }

    async fn gauge_queue_depth(&self) {
        if let Ok(depth) = self.queue.len().await {
            metrics::record_queue_depth(depth);
        }
    }
}
