use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, debug};

use crate::config::MediaConfig;
use crate::error::{Result, MuxError};
use crate::progress::{ProgressLine, ProgressReporter};
use super::{MediaCommand, MediaCommandBuilder, OutputProfile, TranscodeJob, Transcoder};

/// Keep at most this many bytes of stderr in error messages
const STDERR_TAIL_BYTES: usize = 2048;

/// Concrete implementation of the transcoder (FFmpeg-based)
pub struct FfmpegTranscoder {
    command_builder: MediaCommandBuilder,
}

impl FfmpegTranscoder {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(config),
        }
    }

    fn build(&self, job: &TranscodeJob) -> MediaCommand {
        match job.profile {
            OutputProfile::CoverArt => self.command_builder.cover_art(&job.media, &job.cover, &job.output),
            OutputProfile::StillVideo => self.command_builder.still_video(&job.media, &job.cover, &job.output),
        }
    }
}

/// Run a command once, forwarding `-progress` lines and resolving with a
/// single outcome.
pub async fn run_command(
    command: &MediaCommand,
    duration_hint: Option<f64>,
    progress: Option<&ProgressReporter>,
) -> Result<()> {
    debug!(command = %command.display(), "executing media command");

    let mut child = Command::new(&command.binary_path)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MuxError::TranscoderUnavailable(format!("Failed to execute {}: {}", command.binary_path, e)))?;

    // Drain stderr concurrently so a chatty tool never blocks on a full pipe.
    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        })
    });

    if let Some(stdout) = child.stdout.take() {
        let total_us = duration_hint.filter(|d| *d > 0.0).map(|d| d * 1_000_000.0);
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match ProgressLine::parse(&line) {
                ProgressLine::OutTime(us) => {
                    if let (Some(total), Some(reporter)) = (total_us, progress) {
                        reporter.report_ratio(us as f64 / total);
                    }
                    debug!(out_time_us = us, "{} progress", command.description);
                }
                ProgressLine::Status { finished: true } => {
                    debug!("{} reported end of stream", command.description);
                }
                _ => {}
            }
        }
    }

    let status = child.wait().await?;
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };

    if !status.success() {
        return Err(MuxError::Media(format!(
            "{} failed ({}): {}",
            command.description,
            status,
            stderr_tail(&stderr)
        )));
    }

    Ok(())
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// Capture stdout of a short-lived command
async fn capture_stdout(command: &MediaCommand) -> Result<String> {
    let output = Command::new(&command.binary_path)
        .args(&command.args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| MuxError::TranscoderUnavailable(format!("{} not found: {}", command.binary_path, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MuxError::Media(format!("{} failed: {}", command.description, stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, job: &TranscodeJob, progress: Option<&ProgressReporter>) -> Result<()> {
        info!("Muxing {} + {} -> {}",
              job.media.display(), job.cover.display(), job.output.display());

        let command = self.build(job);
        run_command(&command, job.duration_hint, progress).await?;

        info!("{} completed", command.description);
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<Option<f64>> {
        let stdout = capture_stdout(&self.command_builder.probe_duration(path)).await?;
        Ok(parse_duration(&stdout))
    }

    async fn check_availability(&self) -> Result<()> {
        capture_stdout(&self.command_builder.version_check()).await?;
        debug!("Transcoder is available");
        Ok(())
    }

    async fn check_probe(&self) -> Result<()> {
        capture_stdout(&self.command_builder.probe_version_check()).await?;
        debug!("Probe is available");
        Ok(())
    }

    async fn version_info(&self) -> Result<String> {
        let stdout = capture_stdout(&self.command_builder.version_check()).await?;
        // The first line typically contains the version
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}

/// Parse `ffprobe ... format=duration` output. `N/A` and garbage yield `None`.
fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .find_map(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}
