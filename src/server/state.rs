use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::media::Transcoder;

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub transcoder: Arc<dyn Transcoder>,
    /// Where uploads and outputs are materialized
    pub scratch_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &Config, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            transcoder,
            scratch_dir: config.scratch_dir(),
            max_upload_bytes: config.max_upload_bytes(),
        }
    }
}
