//! Worker-local scratch space.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use mailfit_models::UploadId;

/// Process-exclusive disk space for in-flight job files.
///
/// Jobs in one process run strictly one at a time, so the deterministic
/// per-upload filenames can never collide; determinism also means a
/// retried upload overwrites a crashed run's leftovers instead of
/// stacking new ones next to them.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
    retention: Duration,
}

impl ScratchSpace {
    /// Create the scratch root if needed.
    pub fn new(root: impl Into<PathBuf>, retention: Duration) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, retention })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path the source object is downloaded to.
    pub fn input_path(&self, upload_id: &UploadId) -> PathBuf {
        self.root.join(format!("{}_input.mp4", upload_id))
    }

    /// Local path the encoder writes to.
    pub fn output_path(&self, upload_id: &UploadId) -> PathBuf {
        self.root.join(format!("{}_output.mp4", upload_id))
    }

    /// Remove one job's files. Runs after success and failure alike;
    /// missing files are not an error.
    pub async fn cleanup_job(&self, upload_id: &UploadId) {
        for path in [self.input_path(upload_id), self.output_path(upload_id)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed scratch file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }

    /// Sweep files older than the retention window, left behind by runs
    /// that died before their own cleanup. Returns how many were removed.
    pub async fn sweep_stale(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Scratch sweep could not read {}: {}", self.root.display(), e);
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Scratch sweep stopped early: {}", e);
                    break;
                }
            };

            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let stale = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age >= self.retention);
            if !stale {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!("Swept stale scratch file {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to sweep {}: {}", entry.path().display(), e),
            }
        }

        if removed > 0 {
            info!("Swept {} stale scratch files", removed);
        }
        removed
    }
}
