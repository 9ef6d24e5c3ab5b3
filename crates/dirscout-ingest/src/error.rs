//! Error types for the ingestion pipeline

use dirscout_common::DirscoutError;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised by stages, adapters and HTTP collaborators
#[derive(Error, Debug)]
pub enum IngestError {
    /// Checkpoint or error-log storage failed
    #[error(transparent)]
    Storage(#[from] DirscoutError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote service answered with a non-success status
    #[error("{service} returned HTTP {status} for {url}")]
    Status {
        service: &'static str,
        status: u16,
        url: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// No adapter is configured under this source name
    #[error("Unknown source '{0}'. Run 'dirscout sources' to list configured sources.")]
    UnknownSource(String),

    /// Adapter definition or adapter-side extraction failed
    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

impl IngestError {
    pub fn adapter(msg: impl Into<String>) -> Self {
        Self::Adapter(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<toml::de::Error> for IngestError {
    fn from(err: toml::de::Error) -> Self {
        IngestError::Config(err.to_string())
    }
}

impl From<regex::Error> for IngestError {
    fn from(err: regex::Error) -> Self {
        IngestError::Config(err.to_string())
    }
}
