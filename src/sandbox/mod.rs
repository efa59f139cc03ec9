//! In-process conversion inside an isolated per-operation namespace.
//!
//! The same external tool as the HTTP path, but driven locally: both inputs
//! are written into a fresh [`VirtualFs`], the media's audio is combined with
//! the cover's picture, and the result is read back before every namespace
//! file is removed.

pub mod modules;
pub mod vfs;

pub use modules::*;
pub use vfs::*;

use bytes::Bytes;
use tracing::{info, warn, debug};

use crate::error::{Result, MuxError};
use crate::media::{OutputProfile, TranscodeJob};
use crate::progress::ProgressReporter;
use crate::upload::{content_type_for, ConversionResult, InputBlob};

/// Extensions that carry no picture; converting them yields a video container.
const AUDIO_ONLY_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "m4a", "aac", "flac", "ogg", "oga", "opus", "wma", "aiff", "aif",
];

const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

/// Output extension for a media file name.
///
/// Audio-only extensions become `mp4`; anything else passes through as
/// written. A name without an extension also becomes `mp4`.
pub fn output_extension(media_name: &str) -> String {
    let Some(ext) = std::path::Path::new(media_name)
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .filter(|e| !e.is_empty())
    else {
        return DEFAULT_VIDEO_EXTENSION.to_string();
    };

    if AUDIO_ONLY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        DEFAULT_VIDEO_EXTENSION.to_string()
    } else {
        ext
    }
}

pub struct SandboxConverter;

impl SandboxConverter {
    pub async fn convert(
        modules: &LoadedModules,
        media: &InputBlob,
        cover: &InputBlob,
        progress: Option<&ProgressReporter>,
    ) -> Result<ConversionResult> {
        if media.is_empty() || cover.is_empty() {
            return Err(MuxError::MissingInput("Both media and image are required".to_string()));
        }

        let vfs = VirtualFs::open(modules.namespace_root())?;
        let media_name = format!("input.{}", media.extension().unwrap_or_else(|| "bin".to_string()));
        let cover_name = format!("cover.{}", cover.extension().unwrap_or_else(|| "img".to_string()));
        let extension = output_extension(&media.file_name);
        let output_name = format!("output.{}", extension);

        info!(
            media = %media.file_name,
            cover = %cover.file_name,
            output = %output_name,
            namespace = %vfs.root().display(),
            "starting sandbox conversion"
        );

        let outcome = Self::run(modules, &vfs, media, cover, &media_name, &cover_name, &output_name, progress).await;

        for name in [&media_name, &cover_name, &output_name] {
            vfs.delete_file(name).await;
        }
        drop(vfs);

        match outcome {
            Ok(data) => {
                if let Some(reporter) = progress {
                    reporter.finish();
                }
                info!(bytes = data.len(), "sandbox conversion completed");
                Ok(ConversionResult {
                    data: Bytes::from(data),
                    content_type: content_type_for(&extension).to_string(),
                    file_name: format!("output.{}", extension),
                })
            }
            Err(e) => {
                warn!(error = %e, "sandbox conversion failed");
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        modules: &LoadedModules,
        vfs: &VirtualFs,
        media: &InputBlob,
        cover: &InputBlob,
        media_name: &str,
        cover_name: &str,
        output_name: &str,
        progress: Option<&ProgressReporter>,
    ) -> Result<Vec<u8>> {
        vfs.write_file(media_name, &media.data).await?;
        vfs.write_file(cover_name, &cover.data).await?;

        let media_path = vfs.path_of(media_name)?;
        let duration = match modules.engine().probe_duration(&media_path).await {
            Ok(duration) => duration,
            Err(e) => {
                debug!(error = %e, "duration probe failed; progress will stay at 0");
                None
            }
        };

        let job = TranscodeJob::new(
            media_path,
            vfs.path_of(cover_name)?,
            vfs.path_of(output_name)?,
            OutputProfile::StillVideo,
        )
        .with_duration_hint(duration);

        modules.engine().transcode(&job, progress).await?;
        vfs.read_file(output_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use crate::media::Transcoder;

    #[test]
    fn test_output_extension_rule() {
        assert_eq!(output_extension("song.mp3"), "mp4");
        assert_eq!(output_extension("SONG.MP3"), "mp4");
        assert_eq!(output_extension("voice.wav"), "mp4");
        assert_eq!(output_extension("clip.mov"), "mov");
        assert_eq!(output_extension("clip.mkv"), "mkv");
        assert_eq!(output_extension("noext"), "mp4");
    }

    /// Engine double that writes the media bytes followed by the cover bytes
    struct ConcatEngine {
        fail: bool,
        jobs: Mutex<Vec<TranscodeJob>>,
    }

    impl ConcatEngine {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self { fail, jobs: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl Transcoder for ConcatEngine {
        async fn transcode(&self, job: &TranscodeJob, progress: Option<&ProgressReporter>) -> Result<()> {
            self.jobs.lock().unwrap().push(job.clone());
            if let Some(reporter) = progress {
                reporter.report_ratio(0.25);
                reporter.report_ratio(0.75);
            }
            if self.fail {
                return Err(MuxError::Media("Still image video muxing failed: exit status: 1".to_string()));
            }
            let mut data = tokio::fs::read(&job.media).await?;
            data.extend(tokio::fs::read(&job.cover).await?);
            tokio::fs::write(&job.output, data).await?;
            Ok(())
        }

        async fn probe_duration(&self, _path: &Path) -> Result<Option<f64>> {
            Ok(Some(10.0))
        }

        async fn check_availability(&self) -> Result<()> {
            Ok(())
        }

        async fn check_probe(&self) -> Result<()> {
            Ok(())
        }

        async fn version_info(&self) -> Result<String> {
            Ok("concat".to_string())
        }
    }

    fn modules_for(engine: Arc<ConcatEngine>, root: &Path) -> LoadedModules {
        LoadedModules::from_parts(engine, root.to_path_buf())
    }

    #[tokio::test]
    async fn test_audio_input_becomes_mp4() {
        let root = tempfile::tempdir().unwrap();
        let engine = ConcatEngine::new(false);
        let modules = modules_for(engine.clone(), root.path());
        let reporter = ProgressReporter::new();

        let result = SandboxConverter::convert(
            &modules,
            &InputBlob::new("song.mp3", b"AUDIO".to_vec()),
            &InputBlob::new("art.jpg", b"IMG".to_vec()),
            Some(&reporter),
        )
        .await
        .unwrap();

        assert_eq!(&result.data[..], b"AUDIOIMG");
        assert_eq!(result.file_name, "output.mp4");
        assert_eq!(result.content_type, "video/mp4");
        assert_eq!(reporter.current(), 100);

        let jobs = engine.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].profile, OutputProfile::StillVideo);
        assert_eq!(jobs[0].duration_hint, Some(10.0));
        let names: Vec<PathBuf> = [&jobs[0].media, &jobs[0].cover, &jobs[0].output]
            .iter()
            .map(|p| PathBuf::from(p.file_name().unwrap()))
            .collect();
        assert_eq!(names, vec![PathBuf::from("input.mp3"), PathBuf::from("cover.jpg"), PathBuf::from("output.mp4")]);

        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_video_input_keeps_extension() {
        let root = tempfile::tempdir().unwrap();
        let modules = modules_for(ConcatEngine::new(false), root.path());

        let result = SandboxConverter::convert(
            &modules,
            &InputBlob::new("clip.mov", b"MOOV".to_vec()),
            &InputBlob::new("art.png", b"PNG".to_vec()),
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.file_name, "output.mov");
        assert_eq!(result.content_type, "video/quicktime");
    }

    #[tokio::test]
    async fn test_failure_cleans_namespace() {
        let root = tempfile::tempdir().unwrap();
        let modules = modules_for(ConcatEngine::new(true), root.path());
        let reporter = ProgressReporter::new();

        let err = SandboxConverter::convert(
            &modules,
            &InputBlob::new("song.mp3", b"AUDIO".to_vec()),
            &InputBlob::new("art.jpg", b"IMG".to_vec()),
            Some(&reporter),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MuxError::Media(_)));
        assert!(reporter.current() < 100);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_is_refused_before_any_work() {
        let root = tempfile::tempdir().unwrap();
        let engine = ConcatEngine::new(false);
        let modules = modules_for(engine.clone(), root.path());

        let err = SandboxConverter::convert(
            &modules,
            &InputBlob::new("song.mp3", Vec::new()),
            &InputBlob::new("art.jpg", b"IMG".to_vec()),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MuxError::MissingInput(_)));
        assert!(engine.jobs.lock().unwrap().is_empty());
    }
}
