//! The inference collaborator seam.
//!
//! The runner only needs "load an artifact, then map a structure to an
//! energy and per-atom forces". [`Potential`] and [`PotentialLoader`]
//! capture exactly that, so any inference backend can be plugged in.
//!
//! [`PairPotential`] is the built-in backend: a classical pair model
//! (Lennard-Jones, Exponential-6 or Morse per element pair) with
//! per-element reference energies, read from a TOML model artifact.

mod cell;
mod error;
mod pair;

pub use cell::Lattice;
pub use error::Error;
pub use pair::{PairForm, PairPotential, PairPotentialLoader};

use std::path::Path;

use crate::model::prediction::Prediction;
use crate::model::structure::Structure;

/// A loaded model instance that can evaluate structures.
///
/// Returned forces have one entry per atom of the input structure, in
/// atom order.
pub trait Potential: Send {
    fn evaluate(&self, structure: &Structure) -> Result<Prediction, Error>;
}

/// Turns a model artifact on disk into a [`Potential`].
pub trait PotentialLoader: Sync {
    type Potential: Potential;

    fn load(&self, path: &Path) -> Result<Self::Potential, Error>;
}
