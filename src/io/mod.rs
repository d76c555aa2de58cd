//! File interfaces of the pipeline.
//!
//! Structures come in through the extended XYZ reader; per-member
//! predictions go out (and come back in) as JSON artifacts keyed by
//! ensemble and member id.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub mod error;
pub mod extxyz;
pub mod predictions;

mod util;

pub use error::Error;
pub use predictions::{
    artifact_path, clear_ensemble_artifacts, load_member_result, save_member_result,
};

use crate::model::structure::Structure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Xyz,
    ExtXyz,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Xyz => write!(f, "XYZ"),
            Format::ExtXyz => write!(f, "extended XYZ"),
        }
    }
}

/// Reads every frame of a (extended) XYZ file, in file order.
pub fn read_structures(path: &Path) -> Result<Vec<Structure>, Error> {
    let file = File::open(path)?;
    extxyz::read_all(BufReader::new(file))
}
