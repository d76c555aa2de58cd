//! Error types for model loading and evaluation.

use crate::model::types::Element;
use thiserror::Error;

/// Errors raised while loading a model artifact or evaluating it.
#[derive(Debug, Error)]
pub enum Error {
    /// The model artifact could not be read.
    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    /// The model artifact is not valid TOML or does not match the schema.
    #[error("failed to parse model artifact: {0}")]
    ModelParse(#[from] toml::de::Error),

    /// The model parsed but holds values that cannot describe a potential.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// A structure contains an element pair the model has no term for.
    #[error("model has no pair term for {a}-{b}")]
    MissingPair { a: Element, b: Element },

    /// A structure contains an element without a reference energy.
    #[error("model has no reference energy for {0}")]
    MissingReference(Element),

    /// Two atoms (or an atom and a periodic image) sit on top of each other.
    #[error("atoms {i} and {j} overlap (distance {distance:.3e} Å)")]
    Overlap { i: usize, j: usize, distance: f64 },

    /// The periodic cell is degenerate.
    #[error("invalid periodic cell: {0}")]
    InvalidCell(String),

    /// Failure reported by an external inference backend.
    #[error("inference backend failed: {0}")]
    Backend(String),
}
