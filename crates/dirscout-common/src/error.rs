//! Error types for dirscout storage primitives

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dirscout operations
pub type Result<T> = std::result::Result<T, DirscoutError>;

/// Main error type for the shared storage layer
#[derive(Error, Debug)]
pub enum DirscoutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint directory {} is not writable: {source}", path.display())]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt checkpoint {}: {source}", path.display())]
    CorruptCheckpoint {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to persist {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source name: {0}")]
    InvalidSource(String),
}
