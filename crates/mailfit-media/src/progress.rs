//! Parsing of ffmpeg's `-progress` stream.

/// Extract a completion percentage from one `-progress` line.
///
/// Only the elapsed-output-time keys matter. ffmpeg reports both
/// `out_time_ms` and `out_time_us` in microseconds (the `_ms` name predates
/// the `_us` key and was never corrected), so the two are interchangeable
/// here. The result is clamped to 99; 100 is reserved for final completion,
/// written only after the process has exited and the artifact is stored.
///
/// Malformed lines, the negative sentinel ffmpeg emits before the first
/// frame, and degenerate durations all yield 0. Progress reporting is
/// best-effort and must never fail a job.
pub fn progress_percent(line: &str, total_duration_secs: f64) -> f64 {
    if !total_duration_secs.is_finite() || total_duration_secs <= 0.0 {
        return 0.0;
    }

    let Some((key, value)) = line.trim().split_once('=') else {
        return 0.0;
    };
    if key != "out_time_ms" && key != "out_time_us" {
        return 0.0;
    }
    let Ok(elapsed_us) = value.trim().parse::<i64>() else {
        return 0.0;
    };
    if elapsed_us < 0 {
        return 0.0;
    }

    let pct = elapsed_us as f64 / 1_000_000.0 / total_duration_secs * 100.0;
    pct.min(99.0)
}
