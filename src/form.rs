//! Client-side upload form.
//!
//! Holds the two selected files, guards submission, and drives exactly one
//! conversion attempt per submit against either a running server or the
//! local sandbox.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Result, MuxError};
use crate::progress::ProgressReporter;
use crate::sandbox::{LoadedModules, SandboxConverter};
use crate::upload::{ConversionResult, InputBlob};

/// Something that turns a media file and a cover into one muxed file
#[async_trait]
pub trait ConversionBackend: Send + Sync {
    /// Refuse early when the backend cannot run at all
    fn ensure_ready(&self) -> Result<()>;

    async fn convert(
        &self,
        media: &InputBlob,
        cover: &InputBlob,
        progress: Option<&ProgressReporter>,
    ) -> Result<ConversionResult>;
}

/// Posts the files to a running server's `/api/convert`
pub struct RemoteBackend {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl RemoteBackend {
    pub fn new(server_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("covermux/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/convert", server_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn file_part(blob: &InputBlob) -> Part {
    Part::bytes(blob.data.to_vec()).file_name(blob.file_name.clone())
}

/// Pull `filename="..."` out of a Content-Disposition header value
fn attachment_file_name(disposition: &str) -> Option<String> {
    disposition.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        (key.eq_ignore_ascii_case("filename"))
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|name| !name.is_empty())
    })
}

#[async_trait]
impl ConversionBackend for RemoteBackend {
    fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn convert(
        &self,
        media: &InputBlob,
        cover: &InputBlob,
        _progress: Option<&ProgressReporter>,
    ) -> Result<ConversionResult> {
        let form = Form::new()
            .part("media", file_part(media))
            .part("cover", file_part(cover));

        info!(endpoint = %self.endpoint, "submitting upload");
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(MuxError::Remote { status: status.as_u16(), message });
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header("content-type").unwrap_or_else(|| "application/octet-stream".to_string());
        let file_name = header("content-disposition")
            .and_then(|d| attachment_file_name(&d))
            .unwrap_or_else(|| "output".to_string());
        let data = response.bytes().await?;

        Ok(ConversionResult {
            data,
            content_type,
            file_name,
        })
    }
}

/// Runs the conversion locally with already loaded modules
pub struct SandboxBackend {
    modules: Option<LoadedModules>,
}

impl SandboxBackend {
    pub fn new(modules: Option<LoadedModules>) -> Self {
        Self { modules }
    }
}

#[async_trait]
impl ConversionBackend for SandboxBackend {
    fn ensure_ready(&self) -> Result<()> {
        match self.modules {
            Some(_) => Ok(()),
            None => Err(MuxError::ModuleUnavailable(
                "conversion modules are still loading or failed to load".to_string(),
            )),
        }
    }

    async fn convert(
        &self,
        media: &InputBlob,
        cover: &InputBlob,
        progress: Option<&ProgressReporter>,
    ) -> Result<ConversionResult> {
        let modules = self.modules.as_ref().ok_or_else(|| {
            MuxError::ModuleUnavailable("conversion modules not loaded".to_string())
        })?;
        SandboxConverter::convert(modules, media, cover, progress).await
    }
}

/// Muxed file ready to be saved
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl Download {
    /// Write the file into `dir` under its suggested name.
    pub async fn save_into<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let name = Path::new(&self.file_name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "output".into());
        let path = dir.join(name);
        tokio::fs::write(&path, &self.data).await?;
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub enum FormState {
    Idle,
    Submitting,
    Succeeded(Download),
    Failed(String),
}

pub struct UploadForm {
    media: Option<InputBlob>,
    cover: Option<InputBlob>,
    state: FormState,
}

impl UploadForm {
    pub fn new() -> Self {
        Self {
            media: None,
            cover: None,
            state: FormState::Idle,
        }
    }

    pub fn select_media(&mut self, blob: Option<InputBlob>) {
        self.media = blob;
    }

    pub fn select_cover(&mut self, blob: Option<InputBlob>) {
        self.cover = blob;
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, FormState::Submitting)
    }

    /// Whether the submit control should be enabled
    pub fn can_submit(&self, backend: &dyn ConversionBackend) -> bool {
        self.media.is_some() && self.cover.is_some() && !self.is_submitting() && backend.ensure_ready().is_ok()
    }

    /// Submit once. Guard failures leave the state untouched; otherwise the
    /// form ends in `Succeeded` or `Failed`.
    pub async fn submit(
        &mut self,
        backend: &dyn ConversionBackend,
        progress: Option<&ProgressReporter>,
    ) -> Result<Download> {
        if self.is_submitting() {
            return Err(MuxError::Config("a submission is already in progress".to_string()));
        }
        let (Some(media), Some(cover)) = (self.media.as_ref(), self.cover.as_ref()) else {
            return Err(MuxError::MissingInput("Both files are required".to_string()));
        };
        backend.ensure_ready()?;

        let (media, cover) = (media.clone(), cover.clone());
        let submitting = SubmittingState::enter(&mut self.state);

        match backend.convert(&media, &cover, progress).await {
            Ok(result) => {
                info!(file = %result.file_name, bytes = result.data.len(), "conversion succeeded");
                let download = Download {
                    file_name: result.file_name,
                    content_type: result.content_type,
                    data: result.data,
                };
                submitting.settle(FormState::Succeeded(download.clone()));
                Ok(download)
            }
            Err(e) => {
                warn!(error = %e, "conversion failed");
                submitting.settle(FormState::Failed("Conversion failed".to_string()));
                Err(e)
            }
        }
    }
}

/// Holds the form in `Submitting`; falls back to `Idle` if dropped before
/// the attempt settles (e.g. the submit future was cancelled).
struct SubmittingState<'a> {
    state: &'a mut FormState,
}

impl<'a> SubmittingState<'a> {
    fn enter(state: &'a mut FormState) -> Self {
        *state = FormState::Submitting;
        Self { state }
    }

    fn settle(self, outcome: FormState) {
        *self.state = outcome;
    }
}

impl Drop for SubmittingState<'_> {
    fn drop(&mut self) {
        if matches!(self.state, FormState::Submitting) {
            *self.state = FormState::Idle;
        }
    }
}

impl Default for UploadForm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        ready: bool,
        fail: bool,
        calls: AtomicUsize,
    }

    impl CountingBackend {
        fn new(ready: bool, fail: bool) -> Self {
            Self { ready, fail, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ConversionBackend for CountingBackend {
        fn ensure_ready(&self) -> Result<()> {
            if self.ready {
                Ok(())
            } else {
                Err(MuxError::ModuleUnavailable("engine".to_string()))
            }
        }

        async fn convert(
            &self,
            media: &InputBlob,
            _cover: &InputBlob,
            _progress: Option<&ProgressReporter>,
        ) -> Result<ConversionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MuxError::Remote { status: 500, message: "Failed to convert file".to_string() });
            }
            Ok(ConversionResult {
                data: media.data.clone(),
                content_type: "audio/mpeg".to_string(),
                file_name: "output.mp3".to_string(),
            })
        }
    }

    fn filled_form() -> UploadForm {
        let mut form = UploadForm::new();
        form.select_media(Some(InputBlob::new("song.mp3", b"ID3".to_vec())));
        form.select_cover(Some(InputBlob::new("art.jpg", b"JPG".to_vec())));
        form
    }

    #[tokio::test]
    async fn test_submit_requires_both_files() {
        let backend = CountingBackend::new(true, false);
        let mut form = UploadForm::new();
        form.select_media(Some(InputBlob::new("song.mp3", b"ID3".to_vec())));

        assert!(!form.can_submit(&backend));
        let err = form.submit(&backend, None).await.unwrap_err();
        assert!(matches!(err, MuxError::MissingInput(_)));
        assert!(matches!(form.state(), FormState::Idle));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_requires_ready_backend() {
        let backend = CountingBackend::new(false, false);
        let mut form = filled_form();

        assert!(!form.can_submit(&backend));
        let err = form.submit(&backend, None).await.unwrap_err();
        assert!(matches!(err, MuxError::ModuleUnavailable(_)));
        assert!(matches!(form.state(), FormState::Idle));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_exposes_download() {
        let backend = CountingBackend::new(true, false);
        let mut form = filled_form();
        assert!(form.can_submit(&backend));

        let download = form.submit(&backend, None).await.unwrap();
        assert_eq!(download.file_name, "output.mp3");
        assert_eq!(&download.data[..], b"ID3");
        assert!(matches!(form.state(), FormState::Succeeded(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_makes_one_attempt_and_allows_resubmit() {
        let backend = CountingBackend::new(true, true);
        let mut form = filled_form();

        assert!(form.submit(&backend, None).await.is_err());
        assert!(matches!(form.state(), FormState::Failed(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        assert!(form.can_submit(&backend));
        assert!(form.submit(&backend, None).await.is_err());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    /// Backend whose conversion never completes
    struct StalledBackend;

    #[async_trait]
    impl ConversionBackend for StalledBackend {
        fn ensure_ready(&self) -> Result<()> {
            Ok(())
        }

        async fn convert(
            &self,
            _media: &InputBlob,
            _cover: &InputBlob,
            _progress: Option<&ProgressReporter>,
        ) -> Result<ConversionResult> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancelled_submit_returns_to_idle() {
        let mut form = filled_form();

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            form.submit(&StalledBackend, None),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(matches!(form.state(), FormState::Idle));

        let backend = CountingBackend::new(true, false);
        assert!(form.can_submit(&backend));
        form.submit(&backend, None).await.unwrap();
        assert!(matches!(form.state(), FormState::Succeeded(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sandbox_backend_without_modules_is_not_ready() {
        let backend = SandboxBackend::new(None);
        assert!(matches!(backend.ensure_ready(), Err(MuxError::ModuleUnavailable(_))));
        assert!(!filled_form().can_submit(&backend));
    }

    #[test]
    fn test_attachment_file_name() {
        assert_eq!(
            attachment_file_name(r#"attachment; filename="output.mp3""#).as_deref(),
            Some("output.mp3")
        );
        assert_eq!(attachment_file_name("attachment; FILENAME=clip.mov").as_deref(), Some("clip.mov"));
        assert_eq!(attachment_file_name("inline"), None);
        assert_eq!(attachment_file_name(r#"attachment; filename="""#), None);
    }

    #[test]
    fn test_remote_endpoint() {
        let backend = RemoteBackend::new("http://localhost:3000/").unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:3000/api/convert");
    }

    #[tokio::test]
    async fn test_download_save_into_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let download = Download {
            file_name: "../escape/output.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            data: Bytes::from_static(b"MP4"),
        };

        let path = download.save_into(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("output.mp4"));
        assert_eq!(std::fs::read(path).unwrap(), b"MP4");
    }
}
