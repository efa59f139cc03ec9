//! Loading of the three modules the sandbox variant needs.
//!
//! Each module is checked independently; an operation receives the resulting
//! [`LoadedModules`] explicitly instead of looking anything up globally.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::MediaConfig;
use crate::error::{Result, MuxError};
use crate::media::{FfmpegTranscoder, Transcoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// The transcoder binary
    Engine,
    /// The duration probe binary
    Probe,
    /// Writable scratch root for per-operation namespaces
    Namespace,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleKind::Engine => "engine",
            ModuleKind::Probe => "probe",
            ModuleKind::Namespace => "namespace",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    Loaded,
    Missing(String),
}

/// Outcome of [`ToolModules::load`]
pub struct ModuleReport {
    pub statuses: Vec<(ModuleKind, ModuleStatus)>,
    engine: Arc<dyn Transcoder>,
    namespace_root: PathBuf,
}

impl ModuleReport {
    pub fn missing(&self) -> Vec<ModuleKind> {
        self.statuses
            .iter()
            .filter(|(_, status)| *status != ModuleStatus::Loaded)
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn all_loaded(&self) -> bool {
        self.missing().is_empty()
    }

    /// Hand out the module handles only when every module loaded.
    pub fn into_loaded(self) -> Result<LoadedModules> {
        let missing = self.missing();
        if !missing.is_empty() {
            let names = missing.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            return Err(MuxError::ModuleUnavailable(names));
        }
        Ok(LoadedModules {
            engine: self.engine,
            namespace_root: self.namespace_root,
        })
    }
}

/// Handles to the loaded modules
#[derive(Clone)]
pub struct LoadedModules {
    engine: Arc<dyn Transcoder>,
    namespace_root: PathBuf,
}

impl LoadedModules {
    /// Assemble handles that were verified elsewhere
    pub fn from_parts(engine: Arc<dyn Transcoder>, namespace_root: PathBuf) -> Self {
        Self { engine, namespace_root }
    }

    pub fn engine(&self) -> &dyn Transcoder {
        self.engine.as_ref()
    }

    pub fn namespace_root(&self) -> &Path {
        &self.namespace_root
    }
}

pub struct ToolModules;

impl ToolModules {
    /// Check all three modules concurrently.
    pub async fn load(config: &MediaConfig, scratch_root: &Path) -> ModuleReport {
        let engine: Arc<dyn Transcoder> = Arc::new(FfmpegTranscoder::new(config.clone()));
        Self::load_with(engine, scratch_root).await
    }

    pub async fn load_with(engine: Arc<dyn Transcoder>, scratch_root: &Path) -> ModuleReport {
        let (engine_status, probe_status, namespace_status) = tokio::join!(
            status_of(engine.check_availability()),
            status_of(engine.check_probe()),
            status_of(check_namespace(scratch_root)),
        );

        let statuses = vec![
            (ModuleKind::Engine, engine_status),
            (ModuleKind::Probe, probe_status),
            (ModuleKind::Namespace, namespace_status),
        ];

        for (kind, status) in &statuses {
            match status {
                ModuleStatus::Loaded => info!(module = %kind, "module loaded"),
                ModuleStatus::Missing(reason) => warn!(module = %kind, reason = %reason, "module missing"),
            }
        }

        ModuleReport {
            statuses,
            engine,
            namespace_root: scratch_root.to_path_buf(),
        }
    }
}

async fn status_of<F>(check: F) -> ModuleStatus
where
    F: std::future::Future<Output = Result<()>>,
{
    match check.await {
        Ok(()) => ModuleStatus::Loaded,
        Err(e) => ModuleStatus::Missing(e.to_string()),
    }
}

async fn check_namespace(root: &Path) -> Result<()> {
    tokio::fs::create_dir_all(root).await?;
    // Probe writability with a throwaway file
    let probe = tempfile::Builder::new()
        .prefix(".covermux-probe-")
        .tempfile_in(root)?;
    drop(probe);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::TranscodeJob;
    use crate::progress::ProgressReporter;

    /// Engine double whose binaries can be marked missing
    struct StubEngine {
        engine_ok: bool,
        probe_ok: bool,
    }

    #[async_trait::async_trait]
    impl Transcoder for StubEngine {
        async fn transcode(&self, _job: &TranscodeJob, _progress: Option<&ProgressReporter>) -> Result<()> {
            Err(MuxError::Media("stub".to_string()))
        }

        async fn probe_duration(&self, _path: &Path) -> Result<Option<f64>> {
            Ok(None)
        }

        async fn check_availability(&self) -> Result<()> {
            if self.engine_ok {
                Ok(())
            } else {
                Err(MuxError::TranscoderUnavailable("ffmpeg not found".to_string()))
            }
        }

        async fn check_probe(&self) -> Result<()> {
            if self.probe_ok {
                Ok(())
            } else {
                Err(MuxError::TranscoderUnavailable("ffprobe not found".to_string()))
            }
        }

        async fn version_info(&self) -> Result<String> {
            Ok("stub".to_string())
        }
    }

    #[tokio::test]
    async fn test_all_modules_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine { engine_ok: true, probe_ok: true });

        let report = ToolModules::load_with(engine, dir.path()).await;
        assert!(report.all_loaded());

        let loaded = report.into_loaded().unwrap();
        assert_eq!(loaded.namespace_root(), dir.path());
        // The writability probe leaves nothing behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_module_refuses() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine { engine_ok: true, probe_ok: false });

        let report = ToolModules::load_with(engine, dir.path()).await;
        assert_eq!(report.missing(), vec![ModuleKind::Probe]);

        match report.into_loaded() {
            Err(MuxError::ModuleUnavailable(names)) => assert_eq!(names, "probe"),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("modules should not load"),
        }
    }

    #[tokio::test]
    async fn test_unwritable_namespace_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let engine = Arc::new(StubEngine { engine_ok: false, probe_ok: true });

        let report = ToolModules::load_with(engine, &file).await;
        assert_eq!(report.missing(), vec![ModuleKind::Engine, ModuleKind::Namespace]);
    }
}
