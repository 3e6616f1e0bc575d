//! Error types for longtts

use thiserror::Error;

/// Boxed error returned by a synthesis engine
pub type EngineError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for longtts
#[derive(Error, Debug)]
pub enum Error {
    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Crossfade error: {0}")]
    Crossfade(String),

    #[error("Synthesis failed at chunk {chunk_index}: {source}")]
    Synthesis {
        chunk_index: usize,
        #[source]
        source: EngineError,
    },

    #[error("Cancelled before chunk {chunk_index}")]
    Cancelled { chunk_index: usize },

    #[error("{stage} audio rejected ({level}): {}", issues.join("; "))]
    QualityRejected {
        stage: String,
        level: String,
        issues: Vec<String>,
    },

    #[error("Audio processing error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type for longtts operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Index of the chunk this error is attached to, if any
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Error::Synthesis { chunk_index, .. } | Error::Cancelled { chunk_index } => {
                Some(*chunk_index)
            }
            _ => None,
        }
    }

    /// Whether the failure came from outside this crate and may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Synthesis { .. } | Error::Cancelled { .. })
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Error::Audio(err.to_string())
    }
}
