//! Ensemble inference and uncertainty aggregation.
//!
//! The pipeline has two stages that only meet through persisted
//! artifacts:
//!
//! 1. [`run_ensemble`] evaluates every member on the shared evaluation set
//!    and writes one [`MemberResult`](crate::MemberResult) per member.
//! 2. [`aggregate_ensemble`] reads those artifacts back, checks that they
//!    line up point for point and reduces them to an [`EnsembleSummary`].
//!
//! Either stage can be re-run on its own.

mod aggregate;
mod config;
mod error;
mod report;
mod runner;

pub use aggregate::{
    EnsembleSummary, aggregate, aggregate_ensemble, baseline_correct, load_members,
};
pub use config::{EnsembleConfig, MIN_MEMBERS, MemberSpec, Property, StudyConfig};
pub use error::{Error, ErrorKind};
pub use report::{
    Bucket, ComparisonRow, JsonReporter, LogReporter, Reporter, histogram, write_points_csv,
};
pub use runner::{
    EnsembleRun, Observer, RunOptions, check_force_offset, load_structures, run_ensemble,
    run_ensemble_on, run_member,
};
