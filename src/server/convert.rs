//! `POST /api/convert`: two uploaded files in, one muxed file out.
//!
//! Inputs are written to the scratch directory as temp files that keep their
//! original extension, the output goes to a freshly reserved path, and all
//! three are removed when the handler returns, whichever way it returns.

use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::artifact::TempArtifact;
use crate::media::{OutputProfile, TranscodeJob};
use crate::upload::InputBlob;
use super::error::ServerError;
use super::state::AppState;

pub const OUTPUT_CONTENT_TYPE: &str = "audio/mpeg";
pub const OUTPUT_DISPOSITION: &str = "attachment; filename=\"output.mp3\"";

/// Collect the `media` and `cover` parts. Unknown parts are skipped.
async fn read_parts(multipart: &mut Multipart) -> Result<(Option<InputBlob>, Option<InputBlob>), ServerError> {
    let mut media = None;
    let mut cover = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name != "media" && name != "cover" {
            debug!(field = %name, "ignoring unknown form field");
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await?;
        debug!(field = %name, file_name = %file_name, size_bytes = data.len(), "received form part");

        let blob = InputBlob::new(file_name, data);
        if name == "media" {
            media = Some(blob);
        } else {
            cover = Some(blob);
        }
    }

    Ok((media, cover))
}

/// Write an upload to a temp file in `dir`, keeping its extension.
async fn materialize(dir: &Path, blob: &InputBlob) -> Result<NamedTempFile, ServerError> {
    let suffix = blob.extension().map(|ext| format!(".{}", ext)).unwrap_or_default();
    let file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    tokio::fs::write(file.path(), &blob.data).await?;
    Ok(file)
}

pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    // A missing or non-multipart content type is a parse failure too
    let mut multipart = multipart.map_err(|rejection| ServerError::Parse(rejection.body_text()))?;
    let (media, cover) = read_parts(&mut multipart).await?;

    let (Some(media), Some(cover)) = (
        media.filter(|b| !b.is_empty()),
        cover.filter(|b| !b.is_empty()),
    ) else {
        return Err(ServerError::BadRequest("Both media and image are required".into()));
    };

    let media_file = materialize(&state.scratch_dir, &media).await?;
    let cover_file = materialize(&state.scratch_dir, &cover).await?;
    let output = TempArtifact::reserve(&state.scratch_dir, "converted", "mp3");

    info!(
        media = %media.file_name,
        cover = %cover.file_name,
        output = %output.path().display(),
        "converting upload"
    );

    let job = TranscodeJob::new(media_file.path(), cover_file.path(), output.path(), OutputProfile::CoverArt);
    state
        .transcoder
        .transcode(&job, None)
        .await
        .map_err(ServerError::Transcode)?;

    let data = output.read().await.map_err(ServerError::Transcode)?;
    info!(bytes = data.len(), "conversion complete");

    Ok((
        [
            (header::CONTENT_TYPE, OUTPUT_CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, OUTPUT_DISPOSITION),
        ],
        data,
    )
        .into_response())
}
