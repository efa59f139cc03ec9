// Media processing over the external transcoder
//
// - Commands: fixed command lines for each output profile
// - Processor: subprocess execution with progress and a single outcome

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::progress::ProgressReporter;

/// Shape of the muxed output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputProfile {
    /// Re-encoded audio with the image attached as front cover
    CoverArt,
    /// Copied audio over a looped still-image video track
    StillVideo,
}

/// One conversion: two inputs, one output
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub media: PathBuf,
    pub cover: PathBuf,
    pub output: PathBuf,
    pub profile: OutputProfile,
    /// Expected output length in seconds, used only to scale progress
    pub duration_hint: Option<f64>,
}

impl TranscodeJob {
    pub fn new<P: Into<PathBuf>>(media: P, cover: P, output: P, profile: OutputProfile) -> Self {
        Self {
            media: media.into(),
            cover: cover.into(),
            output: output.into(),
            profile,
            duration_hint: None,
        }
    }

    pub fn with_duration_hint(mut self, seconds: Option<f64>) -> Self {
        self.duration_hint = seconds;
        self
    }
}

/// Main trait for the external transcoder
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run one job to completion. Resolves exactly once: `Ok` when the tool
    /// exited successfully, `Err` otherwise. Progress is advisory.
    async fn transcode(&self, job: &TranscodeJob, progress: Option<&ProgressReporter>) -> Result<()>;

    /// Container duration in seconds, `None` when the probe cannot tell
    async fn probe_duration(&self, path: &Path) -> Result<Option<f64>>;

    /// Check if the transcoder binary answers
    async fn check_availability(&self) -> Result<()>;

    /// Check if the probe binary answers
    async fn check_probe(&self) -> Result<()>;

    /// First line of the transcoder's version banner
    async fn version_info(&self) -> Result<String>;
}

/// Factory for creating transcoder instances
pub struct TranscoderFactory;

impl TranscoderFactory {
    /// Create the default transcoder implementation (FFmpeg-based)
    pub fn create(config: MediaConfig) -> Box<dyn Transcoder> {
        Box::new(FfmpegTranscoder::new(config))
    }
}
