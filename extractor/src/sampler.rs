use slide_deck_common::config::SamplingConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::keys::frame_pattern;

/// Frames written by one sampling run.
#[derive(Debug)]
pub struct SampledFrames {
    pub dir: PathBuf,
    pub count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("failed to create frame directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to spawn {0}: {1}")]
    Spawn(String, std::io::Error),
    #[error("ffmpeg exited with non-zero status: {0}")]
    FfmpegFailed(String),
    #[error("failed to list sampled frames: {0}")]
    ListOutput(std::io::Error),
}

/// Arguments for sampling one frame every `interval_secs` into `out_dir`.
pub fn ffmpeg_args(video: &Path, out_dir: &Path, config: &SamplingConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostdin",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(video.as_os_str().to_owned());
    args.extend(
        [
            "-vf".to_string(),
            format!("fps=1/{}", config.interval_secs),
            "-q:v".to_string(),
            "2".to_string(),
            "-y".to_string(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(out_dir.join(frame_pattern(&config.image_ext)).into_os_string());
    args
}

/// Sample `video` into numbered stills under `out_dir` with an ffmpeg
/// subprocess. The directory is created if needed.
pub async fn sample_video(
    video: &Path,
    out_dir: &Path,
    config: &SamplingConfig,
) -> Result<SampledFrames, SamplerError> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| SamplerError::CreateDir(out_dir.display().to_string(), e))?;

    let args = ffmpeg_args(video, out_dir, config);
    info!(
        video = %video.display(),
        out = %out_dir.display(),
        interval_secs = config.interval_secs,
        "sampling frames"
    );
    debug!(ffmpeg = config.ffmpeg, ?args, "ffmpeg command");

    let output = Command::new(&config.ffmpeg)
        .args(&args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .output()
        .await
        .map_err(|e| SamplerError::Spawn(config.ffmpeg.clone(), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(stderr = %stderr, "ffmpeg exited with error");
        return Err(SamplerError::FfmpegFailed(stderr.into_owned()));
    }

    let count = count_frames(out_dir, &config.image_ext).await?;
    info!(count, dir = %out_dir.display(), "frame sampling complete");
    Ok(SampledFrames {
        dir: out_dir.to_path_buf(),
        count,
    })
}

async fn count_frames(dir: &Path, ext: &str) -> Result<usize, SamplerError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(SamplerError::ListOutput)?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await.map_err(SamplerError::ListOutput)? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(ext) {
            count += 1;
        }
    }
    Ok(count)
}

/// Check whether ffmpeg is runnable. Logs a warning if not.
pub async fn check_ffmpeg_available(ffmpeg: &str) -> bool {
    match Command::new(ffmpeg).arg("-version").output().await {
        Ok(out) if out.status.success() => {
            debug!(ffmpeg, "ffmpeg is available");
            true
        }
        Ok(_) => {
            warn!(ffmpeg, "ffmpeg returned non-zero for -version; sampling may fail");
            false
        }
        Err(e) => {
            warn!(
                ffmpeg,
                error = %e,
                "ffmpeg not found; video inputs cannot be sampled, frame directories still work"
            );
            false
        }
    }
}
