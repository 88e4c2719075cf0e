//! Artifact transfer between the object store and scratch space.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use mailfit_models::UploadId;
use mailfit_storage::{attachment_disposition, output_key, source_key, ObjectStore};

use crate::error::WorkerResult;
use crate::metrics;
use crate::scratch::ScratchSpace;

/// Moves job artifacts between the object store and local scratch space.
///
/// Every operation is keyed deterministically by upload id, so a re-run of
/// the same job reads from and overwrites exactly the objects and scratch
/// files of the run before it.
pub struct ArtifactTransfer {
    store: Arc<dyn ObjectStore>,
    scratch: ScratchSpace,
    url_ttl: Duration,
}

impl ArtifactTransfer {
    pub fn new(store: Arc<dyn ObjectStore>, scratch: ScratchSpace, url_ttl: Duration) -> Self {
        Self {
            store,
            scratch,
            url_ttl,
        }
    }

    /// Download the job's source object into scratch; returns the local path.
    pub async fn fetch_source(&self, upload_id: &UploadId) -> WorkerResult<PathBuf> {
        let key = source_key(upload_id);
        let dest = self.scratch.input_path(upload_id);

        let started = Instant::now();
        self.store.download_source(&key, &dest).await?;
        metrics::record_download(started.elapsed().as_secs_f64());

        Ok(dest)
    }

    /// Upload the compressed artifact; returns its output key.
    pub async fn store_result(&self, local: &Path, upload_id: &UploadId) -> WorkerResult<String> {
        let key = output_key(upload_id);

        let started = Instant::now();
        self.store.upload_result(local, &key, "video/mp4").await?;
        metrics::record_upload(started.elapsed().as_secs_f64());

        Ok(key)
    }

    /// Mint a time-limited URL that downloads the result as `filename`.
    pub async fn mint_retrieval_url(&self, key: &str, filename: &str) -> WorkerResult<String> {
        let url = self
            .store
            .presign_result(key, &attachment_disposition(filename), self.url_ttl)
            .await?;
        debug!("Minted retrieval URL for {} ({}s ttl)", key, self.url_ttl.as_secs());
        Ok(url)
    }
}
