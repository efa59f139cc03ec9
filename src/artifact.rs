//! Scoped temporary files.
//!
//! A [`TempArtifact`] owns a path in the scratch directory and removes it when
//! dropped, so every exit path of a request releases what it created.

use std::path::{Path, PathBuf};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Reserve a fresh, collision-resistant path `<prefix>-<millis>-<uuid>.<ext>`
    /// inside `dir`. Nothing is created on disk until something writes to it.
    pub fn reserve<P: AsRef<Path>>(dir: P, prefix: &str, extension: &str) -> Self {
        let name = format!(
            "{}-{}-{}.{}",
            prefix,
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        );
        Self {
            path: dir.as_ref().join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole artifact into memory.
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed temporary artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove temporary artifact"),
        }
    }
}
