//! Error types for ensemble inference and aggregation.
//!
//! Every variant aborts processing of the current ensemble. Variants name
//! the member, structure or file at fault so the failure can be traced
//! without re-running.

use std::path::PathBuf;
use thiserror::Error;

use crate::{io, potential};

/// Broad failure class, independent of the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A model, structure, prediction or configuration file is missing or corrupt.
    Load,
    /// The potential failed while evaluating a structure.
    Inference,
    /// Member predictions do not line up point for point.
    Alignment,
    /// The requested run is not well defined.
    Config,
}

/// Errors that can occur while running or aggregating an ensemble.
#[derive(Debug, Error)]
pub enum Error {
    /// The study configuration file could not be read.
    #[error("failed to read configuration '{}'", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The study configuration file is not valid TOML or has the wrong shape.
    #[error("failed to parse configuration '{}'", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The evaluation structure file could not be read.
    #[error("failed to load structures from '{}'", path.display())]
    Structures {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A member's model artifact could not be loaded.
    #[error("failed to load model of member '{member}' from '{}'", path.display())]
    Model {
        member: String,
        path: PathBuf,
        #[source]
        source: potential::Error,
    },

    /// A member's persisted predictions could not be read.
    #[error("failed to load predictions of member '{member}' from '{}'", path.display())]
    Predictions {
        member: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A member's predictions could not be written.
    #[error("failed to persist predictions of member '{member}' under '{}'", path.display())]
    Persist {
        member: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Artifacts left by an earlier run could not be removed.
    #[error("failed to remove old predictions of ensemble '{ensemble}' under '{}'", path.display())]
    Clear {
        ensemble: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The potential raised while evaluating one structure.
    #[error("member '{member}' failed on structure {index}")]
    Inference {
        member: String,
        index: usize,
        #[source]
        source: potential::Error,
    },

    /// A member's prediction sequence does not match the others.
    #[error("member '{member}' has {found} predictions, expected {expected}")]
    Alignment {
        member: String,
        expected: usize,
        found: usize,
    },

    /// The configuration or request is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The worker pool for parallel inference could not be started.
    #[error("failed to start {threads} inference workers")]
    ThreadPool {
        threads: usize,
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigRead { .. }
            | Error::ConfigParse { .. }
            | Error::Structures { .. }
            | Error::Model { .. }
            | Error::Predictions { .. }
            | Error::Persist { .. }
            | Error::Clear { .. } => ErrorKind::Load,
            Error::Inference { .. } => ErrorKind::Inference,
            Error::Alignment { .. } => ErrorKind::Alignment,
            Error::Config(_) | Error::ThreadPool { .. } => ErrorKind::Config,
        }
    }

    pub fn config(details: impl Into<String>) -> Self {
        Self::Config(details.into())
    }

    pub fn alignment(member: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::Alignment {
            member: member.into(),
            expected,
            found,
        }
    }

    pub fn inference(member: impl Into<String>, index: usize, source: potential::Error) -> Self {
        Self::Inference {
            member: member.into(),
            index,
            source,
        }
    }
}
