use bytes::Bytes;
use std::path::Path;

use crate::error::{Result, MuxError};

/// One uploaded file: original name plus its bytes
#[derive(Debug, Clone)]
pub struct InputBlob {
    pub file_name: String,
    pub data: Bytes,
}

impl InputBlob {
    pub fn new<S: Into<String>, B: Into<Bytes>>(file_name: S, data: B) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MuxError::FileNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, data))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Lowercased extension of the original name, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

/// Muxed output returned once per conversion
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub data: Bytes,
    pub content_type: String,
    pub file_name: String,
}

/// Content type for a muxed output extension
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
