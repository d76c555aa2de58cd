use super::Format;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("failed to parse {format} data: {details} (at line ~{line})")]
    Parse {
        format: Format,
        line: usize,
        details: String,
    },

    #[error("failed to decode prediction artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("prediction artifact '{}' is invalid: {details}", path.display())]
    Artifact { path: PathBuf, details: String },
}

impl Error {
    pub fn parse(format: Format, line: usize, details: impl Into<String>) -> Self {
        Self::Parse {
            format,
            line,
            details: details.into(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            details: details.into(),
        }
    }
}
