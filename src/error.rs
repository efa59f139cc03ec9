use thiserror::Error;

#[derive(Error, Debug)]
pub enum MuxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Transcoder unavailable: {0}")]
    TranscoderUnavailable(String),

    #[error("Required modules not loaded: {0}")]
    ModuleUnavailable(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Server responded with {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, MuxError>;
