use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;

use crate::error::{Result, MuxError};

/// Isolated per-operation file namespace.
///
/// Files are addressed by bare names; the backing directory is unique to the
/// operation and removed when the namespace is dropped.
pub struct VirtualFs {
    dir: TempDir,
}

impl VirtualFs {
    pub fn open(root: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("covermux-op-").tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(MuxError::Config(format!("Invalid namespace file name: {:?}", name)));
        }
        Ok(self.dir.path().join(name))
    }

    pub async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        tokio::fs::write(self.path_of(name)?, data).await?;
        Ok(())
    }

    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MuxError::FileNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort delete; a file that never got written is not an error.
    pub async fn delete_file(&self, name: &str) {
        let Ok(path) = self.path_of(name) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(file = name, error = %e, "failed to delete namespace file"),
        }
    }
}
