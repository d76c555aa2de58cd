//! Ensemble-based uncertainty estimates for machine-learned interatomic potentials.
//!
//! Several independently trained models (the *members* of an ensemble)
//! predict energies and forces for the same evaluation set. Their
//! disagreement, the per-structure standard deviation across members, is
//! the uncertainty estimate. This crate runs the members, persists their
//! predictions and reduces them to per-structure and mean spreads.
//!
//! # Features
//!
//! - **Pluggable inference** — any backend implementing [`Potential`] and
//!   [`PotentialLoader`] can be run; a classical [`PairPotential`] ships
//!   built in
//! - **Deterministic aggregation** — per-member energy baseline correction,
//!   population variance across members, bit-identical reruns
//! - **Resumable pipeline** — inference and aggregation meet only through
//!   per-member JSON artifacts
//! - **Parallel members** — independent members run on a bounded worker pool
//!
//! # Quick Start
//!
//! Aggregating already computed member predictions:
//!
//! ```
//! use ensemble_sigma::{MemberResult, Prediction, Property, aggregate};
//!
//! let mut members = Vec::new();
//! for (id, energies) in [("0", [-10.0, -9.0]), ("1", [-4.0, -2.0])] {
//!     let mut result = MemberResult::new("deep", id);
//!     for e in energies {
//!         result.push(Prediction::new(e, vec![]));
//!     }
//!     members.push(result);
//! }
//!
//! // Each member is shifted by its own minimum: [0, 1] and [0, 2].
//! let summary = aggregate("deep", Property::Energy, &members, None)?;
//! assert_eq!(summary.std, vec![0.0, 0.5]);
//! assert_eq!(summary.mean_std, 0.25);
//! # Ok::<(), ensemble_sigma::EnsembleError>(())
//! ```
//!
//! # Module Organization
//!
//! - [`io`] — Extended XYZ structure reader and prediction artifacts
//! - [`potential`] — The inference seam and the built-in pair potential
//! - [`ensemble`] — Study configuration, inference runner, aggregation and reporting
//!
//! # Data Types
//!
//! - [`Structure`] / [`Atom`] — Atomic configuration with optional periodic cell
//! - [`Element`] — Chemical element (H through Og)
//! - [`Prediction`] — Energy and per-atom forces for one structure
//! - [`MemberResult`] — Ordered predictions of one member over the evaluation set
//! - [`EnsembleSummary`] — Per-point mean, variance and σ plus the mean σ

mod model;

pub mod ensemble;
pub mod io;
pub mod potential;

pub use model::prediction::{MemberResult, Prediction};
pub use model::structure::{Atom, Structure};
pub use model::types::{Element, ParseElementError};

pub use potential::{PairPotential, PairPotentialLoader, Potential, PotentialLoader};

pub use ensemble::{
    ComparisonRow, EnsembleConfig, EnsembleSummary, MemberSpec, Property, RunOptions,
    StudyConfig, aggregate, aggregate_ensemble, run_ensemble,
};

pub use ensemble::Error as EnsembleError;
