//! The per-job compression pipeline.
//!
//! One call takes a job from `processing` to `done`: plan the budget, fetch
//! the source, encode, store the result, mint the retrieval URL, notify.
//! The caller owns the `error` terminal write and scratch cleanup.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{info, warn};

use mailfit_media::{ProgressFn, Transcoder};
use mailfit_models::PlannerConfig;
use mailfit_notify::Notifier;
use mailfit_queue::CompressMessage;

use crate::error::WorkerResult;
use crate::metrics;
use crate::scratch::ScratchSpace;
use crate::sync::{JobRecordSync, ProgressGate};
use crate::transfer::ArtifactTransfer;

/// Unpersisted progress samples buffered before new ones are shed.
///
/// A persistence stall must never block the encoder's reader task; when the
/// channel fills, samples are dropped and the next tick supersedes them.
const PROGRESS_BACKLOG: usize = 64;

/// Everything one job run needs, wired once at startup.
pub struct JobPipeline {
    sync: Arc<JobRecordSync>,
    transfer: ArtifactTransfer,
    transcoder: Arc<dyn Transcoder>,
    notifier: Arc<dyn Notifier>,
    scratch: ScratchSpace,
    planner: PlannerConfig,
}

impl JobPipeline {
    pub fn new(
        sync: Arc<JobRecordSync>,
        transfer: ArtifactTransfer,
        transcoder: Arc<dyn Transcoder>,
        notifier: Arc<dyn Notifier>,
        scratch: ScratchSpace,
        planner: PlannerConfig,
    ) -> Self {
        Self {
            sync,
            transfer,
            transcoder,
            notifier,
            scratch,
            planner,
        }
    }

    /// Run one job end to end; returns the minted retrieval URL.
    ///
    /// Progress flows encoder -> bounded channel -> persistence task, and
    /// the task is drained before any terminal write, so no reader of the
    /// record ever sees progress move backwards or land after 100.
    pub async fn process(&self, message: &CompressMessage, email: &str) -> WorkerResult<String> {
        let upload_id = &message.upload_id;

        self.sync.mark_processing(upload_id).await;

        let plan = self.planner.plan(message.provider, message.duration_sec);
        info!(
            upload_id = %upload_id,
            "Compressing for {}: {} kbps video, {}px cap, {} byte limit",
            message.provider,
            plan.video_kbps,
            plan.max_edge_px,
            plan.target_bytes
        );

        let input_path = self.transfer.fetch_source(upload_id).await?;
        let output_path = self.scratch.output_path(upload_id);

        let (progress_tx, mut progress_rx) = mpsc::channel::<f64>(PROGRESS_BACKLOG);
        let sync = Arc::clone(&self.sync);
        let persist_id = upload_id.clone();
        let persist = tokio::spawn(async move {
            // mark_processing seeded the record at 1%
            let mut gate = ProgressGate::new(1.0);
            while let Some(pct) = progress_rx.recv().await {
                if gate.admit(pct) {
                    sync.report_progress(&persist_id, pct).await;
                }
            }
        });

        let on_progress: ProgressFn = Box::new(move |pct| {
            let _ = progress_tx.try_send(pct);
        });

        let encode_started = Instant::now();
        let encoded = self
            .transcoder
            .compress(
                &input_path,
                &output_path,
                &plan,
                message.duration_sec,
                on_progress,
            )
            .await;
        metrics::record_encode(encode_started.elapsed().as_secs_f64(), encoded.is_ok());

        // The encoder dropped its callback on return; draining the channel
        // here orders the terminal write after the last progress write.
        if let Err(e) = persist.await {
            warn!(upload_id = %upload_id, "Progress persistence task failed: {}", e);
        }
        encoded?;

        let output_key = self.transfer.store_result(&output_path, upload_id).await?;
        let url = self
            .transfer
            .mint_retrieval_url(&output_key, message.attachment_name())
            .await?;

        self.sync.mark_done(upload_id, &output_key, &url).await;
        info!(upload_id = %upload_id, "Job done, artifact at {}", output_key);

        // Best-effort: the job is done whether or not the email lands.
        if email.contains('@') {
            if let Err(e) = self
                .notifier
                .job_completed(email, &url, message.attachment_name())
                .await
            {
                warn!(upload_id = %upload_id, "Completion email to {} failed: {}", email, e);
            }
        }

        Ok(url)
    }
}
