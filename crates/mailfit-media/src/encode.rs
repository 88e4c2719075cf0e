//! The fixed compression profile and its supervised ffmpeg run.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use mailfit_models::BudgetPlan;

use crate::error::{MediaError, MediaResult};
use crate::progress::progress_percent;

/// Callback fed one percentage per readable progress line.
pub type ProgressFn = Box<dyn Fn(f64) + Send + 'static>;

/// The seam the worker pipeline drives encodes through.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Compress `input` into `output` under the given budget.
    ///
    /// `duration_secs` is the source duration the progress stream is scaled
    /// against. Returns only after the child has exited and its output
    /// streams are drained.
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        plan: &BudgetPlan,
        duration_secs: f64,
        on_progress: ProgressFn,
    ) -> MediaResult<()>;
}

/// Kernel resource ceilings applied to the encoder child process.
#[derive(Debug, Clone, Copy)]
pub struct EncodeLimits {
    /// CPU-time ceiling in seconds
    pub cpu_secs: u64,
    /// Address-space ceiling in bytes
    pub memory_bytes: u64,
    /// Open file descriptor ceiling
    pub max_open_files: u64,
    /// Wall-clock ceiling for one encode
    pub wall_clock: Duration,
}

impl Default for EncodeLimits {
    fn default() -> Self {
        Self {
            cpu_secs: 1800,
            memory_bytes: 2 * 1024 * 1024 * 1024,
            max_open_files: 64,
            wall_clock: Duration::from_secs(2700),
        }
    }
}

/// Drives ffmpeg with the fixed H.264/AAC profile.
///
/// Encodes are serialized through a single-permit semaphore; the resource
/// limits assume at most one child process at a time.
pub struct Encoder {
    program: PathBuf,
    limits: EncodeLimits,
    gate: Semaphore,
}

impl Encoder {
    /// Create an encoder, resolving `ffmpeg` from `PATH`.
    pub fn new() -> MediaResult<Self> {
        Ok(Self::with_program(check_ffmpeg()?))
    }

    /// Create an encoder around an explicit binary path.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            limits: EncodeLimits::default(),
            gate: Semaphore::new(1),
        }
    }

    /// Replace the default resource limits.
    pub fn with_limits(mut self, limits: EncodeLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[async_trait]
impl Transcoder for Encoder {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        plan: &BudgetPlan,
        duration_secs: f64,
        on_progress: ProgressFn,
    ) -> MediaResult<()> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| MediaError::ResourceLimit("Semaphore closed".to_string()))?;

        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let args = compress_args(input, output, plan);
        debug!("Running ffmpeg {}", args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            let limits = self.limits;
            // Safety: setrlimit is async-signal-safe and runs in the forked
            // child before exec.
            unsafe {
                cmd.pre_exec(move || apply_rlimits(&limits));
            }
        }

        let mut child = cmd.spawn()?;

        // Machine-readable progress arrives on stdout (`-progress pipe:1`);
        // stderr carries only errors under `-nostats -loglevel error`.
        let stdout = child.stdout.take().expect("stdout not captured");
        let progress_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                on_progress(progress_percent(&line, duration_secs));
            }
        });

        let stderr = child.stderr.take().expect("stderr not captured");
        let stderr_handle = tokio::spawn(async move {
            let mut tail: VecDeque<String> = VecDeque::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Vec::from(tail).join("\n")
        });

        let status = match tokio::time::timeout(self.limits.wall_clock, child.wait()).await {
            Ok(waited) => waited?,
            Err(_) => {
                warn!(
                    "ffmpeg exceeded {}s wall clock, killing process",
                    self.limits.wall_clock.as_secs()
                );
                let _ = child.kill().await;
                let _ = progress_handle.await;
                let _ = stderr_handle.await;
                return Err(MediaError::Timeout(self.limits.wall_clock.as_secs()));
            }
        };

        let _ = progress_handle.await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                format!("ffmpeg exited with {status}"),
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                status.code(),
            ))
        }
    }
}

const STDERR_TAIL_LINES: usize = 16;

/// Build the fixed compression argument list.
///
/// The profile is not negotiable per job; only the numbers from the budget
/// plan vary. `-fs` backstops the plan with a hard output size cap, and
/// `-threads 1` pairs with the CPU rlimit so one pathological input cannot
/// starve the host.
fn compress_args(input: &Path, output: &Path, plan: &BudgetPlan) -> Vec<String> {
    let video_kbps = plan.video_kbps;
    let maxrate_kbps = video_kbps * 3 / 2;
    let bufsize_kbps = video_kbps * 2;

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        // First video stream, first audio stream if present
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "0:a:0?".into(),
        "-vf".into(),
        scale_filter(plan.max_edge_px),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-threads".into(),
        "1".into(),
        "-b:v".into(),
        format!("{video_kbps}k"),
        "-maxrate".into(),
        format!("{maxrate_kbps}k"),
        "-bufsize".into(),
        format!("{bufsize_kbps}k"),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", plan.audio_kbps),
        "-ac".into(),
        "2".into(),
        "-ar".into(),
        "44100".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-fs".into(),
        plan.target_bytes.to_string(),
        "-progress".into(),
        "pipe:1".into(),
        "-nostats".into(),
        "-loglevel".into(),
        "error".into(),
    ];
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Scale expression capping the longer frame dimension at `max_edge_px`.
///
/// Never upscales and preserves aspect ratio. libx264 rejects odd frame
/// sizes under yuv420p, so the capped axis is floored to even with
/// `trunc(.../2)*2` and the derived axis uses `-2`.
fn scale_filter(max_edge_px: u32) -> String {
    format!(
        "scale='if(gt(iw,ih),trunc(min({max_edge_px},iw)/2)*2,-2)':'if(gt(iw,ih),-2,trunc(min({max_edge_px},ih)/2)*2)'"
    )
}

#[cfg(unix)]
fn apply_rlimits(limits: &EncodeLimits) -> std::io::Result<()> {
    use nix::sys::resource::{setrlimit, Resource};

    setrlimit(Resource::RLIMIT_CPU, limits.cpu_secs, limits.cpu_secs)?;
    setrlimit(Resource::RLIMIT_AS, limits.memory_bytes, limits.memory_bytes)?;
    setrlimit(
        Resource::RLIMIT_NOFILE,
        limits.max_open_files,
        limits.max_open_files,
    )?;
    Ok(())
}

/// Check that ffmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}
