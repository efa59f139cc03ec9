use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, MuxError};

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_upload_mb() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP address to bind
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Directory holding uploaded inputs, outputs and sandbox namespaces.
    /// Defaults to the system temp directory.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Maximum accepted request body, in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary, used for duration probing
    pub probe_path: String,
    /// Audio encoder for cover-art output
    pub audio_codec: String,
    /// Encoder for the embedded cover picture
    pub cover_codec: String,
    /// Video encoder for still-image video output
    pub video_codec: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit console records as newline-delimited JSON
    #[serde(default)]
    pub json: bool,
    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            scratch_dir: None,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            probe_path: "ffprobe".to_string(),
            audio_codec: "libmp3lame".to_string(),
            cover_codec: "mjpeg".to_string(),
            video_codec: "libx264".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MuxError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    /// Write a default configuration file. Refuses to replace an existing
    /// file unless `force` is set.
    pub fn write_default<P: AsRef<Path>>(path: P, force: bool) -> Result<()> {
        let path = path.as_ref();
        if path.exists() && !force {
            return Err(MuxError::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        Self::default().save_to_file(path)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MuxError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| MuxError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply `COVERMUX_*` environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("COVERMUX_BIND") {
            self.server.bind_address = v;
        }
        if let Some(v) = lookup("COVERMUX_SCRATCH_DIR") {
            self.server.scratch_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("COVERMUX_MAX_UPLOAD_MB").and_then(|v| v.parse().ok()) {
            self.server.max_upload_mb = v;
        }
        if let Some(v) = lookup("COVERMUX_FFMPEG") {
            self.media.binary_path = v;
        }
        if let Some(v) = lookup("COVERMUX_FFPROBE") {
            self.media.probe_path = v;
        }
        if let Some(v) = lookup("COVERMUX_LOG") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("COVERMUX_LOG_JSON") {
            self.logging.json = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    /// Scratch directory for temporary artifacts
    pub fn scratch_dir(&self) -> PathBuf {
        self.server
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
