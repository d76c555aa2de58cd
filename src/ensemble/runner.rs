//! Ensemble inference: every member evaluates the shared evaluation set.
//!
//! For each member the runner loads the model artifact through a
//! [`PotentialLoader`], evaluates the structures in file order, drops the
//! forces of atoms below the configured offset and persists the two
//! parallel sequences as one artifact keyed by `(ensemble, member)`.
//!
//! Members are independent. With more than one job they run on a bounded
//! rayon pool; artifacts are still returned in configured member order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use super::config::{EnsembleConfig, MemberSpec};
use super::error::Error;
use crate::io;
use crate::model::prediction::MemberResult;
use crate::model::structure::Structure;
use crate::potential::{self, Potential, PotentialLoader};

/// Progress hooks called by the runner. All methods default to no-ops.
///
/// With parallel jobs the hooks are called from worker threads, so calls
/// for different members interleave.
pub trait Observer: Sync {
    fn member_started(&self, _member: &str, _structures: usize) {}

    fn structure_evaluated(&self, _member: &str, _index: usize) {}

    fn member_finished(&self, _member: &str, _artifact: &Path) {}
}

impl Observer for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Members evaluated concurrently. `0` uses one worker per CPU.
    pub jobs: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

/// Outcome of [`run_ensemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsembleRun {
    pub ensemble: String,
    /// Size of the evaluation set, i.e. the length of every artifact.
    pub structures: usize,
    /// One artifact per member, in configured member order.
    pub artifacts: Vec<PathBuf>,
}

/// Reads the evaluation set of `config`.
pub fn load_structures(config: &EnsembleConfig) -> Result<Vec<Structure>, Error> {
    let structures =
        io::read_structures(&config.structures).map_err(|source| Error::Structures {
            path: config.structures.clone(),
            source,
        })?;
    debug!(
        ensemble = %config.name,
        path = %config.structures.display(),
        count = structures.len(),
        "Loaded evaluation structures"
    );
    Ok(structures)
}

/// Every structure must keep at least the atoms at and after `offset`.
pub fn check_force_offset(structures: &[Structure], offset: usize) -> Result<(), Error> {
    if let Some((index, s)) = structures
        .iter()
        .enumerate()
        .find(|(_, s)| s.atom_count() < offset)
    {
        return Err(Error::config(format!(
            "force offset {offset} exceeds the {} atoms of structure {index}",
            s.atom_count()
        )));
    }
    Ok(())
}

/// Evaluates one loaded member over `structures`, in order.
///
/// The returned result holds one energy and one force slice per structure.
/// Each force slice starts at atom `force_offset`.
pub fn run_member<P: Potential + ?Sized>(
    ensemble: &str,
    member: &str,
    potential: &P,
    structures: &[Structure],
    force_offset: usize,
    observer: &dyn Observer,
) -> Result<MemberResult, Error> {
    observer.member_started(member, structures.len());
    let mut result = MemberResult::with_capacity(ensemble, member, structures.len());

    for (index, structure) in structures.iter().enumerate() {
        let mut prediction = potential
            .evaluate(structure)
            .map_err(|source| Error::inference(member, index, source))?;

        if prediction.forces.len() != structure.atom_count() {
            return Err(Error::inference(
                member,
                index,
                potential::Error::Backend(format!(
                    "returned {} forces for {} atoms",
                    prediction.forces.len(),
                    structure.atom_count()
                )),
            ));
        }
        if !prediction.energy.is_finite() {
            return Err(Error::inference(
                member,
                index,
                potential::Error::Backend(format!(
                    "returned a non-finite energy ({})",
                    prediction.energy
                )),
            ));
        }
        if let Some(atom) = prediction
            .forces
            .iter()
            .position(|f| f.iter().any(|c| !c.is_finite()))
        {
            return Err(Error::inference(
                member,
                index,
                potential::Error::Backend(format!("returned a non-finite force on atom {atom}")),
            ));
        }
        if force_offset > prediction.forces.len() {
            return Err(Error::config(format!(
                "force offset {force_offset} exceeds the {} atoms of structure {index}",
                prediction.forces.len()
            )));
        }

        prediction.forces = prediction.forces.split_off(force_offset);
        result.push(prediction);
        observer.structure_evaluated(member, index);
    }

    Ok(result)
}

/// Runs every member of `config` and persists its predictions under
/// `output_dir`.
pub fn run_ensemble<L: PotentialLoader>(
    config: &EnsembleConfig,
    loader: &L,
    output_dir: &Path,
    options: RunOptions,
    observer: &dyn Observer,
) -> Result<EnsembleRun, Error> {
    config.validate()?;
    let structures = load_structures(config)?;
    run_ensemble_on(config, &structures, loader, output_dir, options, observer)
}

/// [`run_ensemble`] over an evaluation set that is already in memory.
pub fn run_ensemble_on<L: PotentialLoader>(
    config: &EnsembleConfig,
    structures: &[Structure],
    loader: &L,
    output_dir: &Path,
    options: RunOptions,
    observer: &dyn Observer,
) -> Result<EnsembleRun, Error> {
    config.validate()?;
    if structures.is_empty() {
        return Err(Error::config(format!(
            "evaluation set '{}' contains no structures",
            config.structures.display()
        )));
    }
    check_force_offset(structures, config.force_offset)?;

    io::clear_ensemble_artifacts(output_dir, &config.name).map_err(|source| Error::Clear {
        ensemble: config.name.clone(),
        path: output_dir.join(&config.name),
        source,
    })?;

    info!(
        ensemble = %config.name,
        members = config.members.len(),
        structures = structures.len(),
        force_offset = config.force_offset,
        jobs = options.jobs,
        "Running ensemble inference"
    );

    let infer = |spec: &MemberSpec| -> Result<PathBuf, Error> {
        let model = loader.load(&spec.model).map_err(|source| Error::Model {
            member: spec.id.clone(),
            path: spec.model.clone(),
            source,
        })?;
        let result = run_member(
            &config.name,
            &spec.id,
            &model,
            structures,
            config.force_offset,
            observer,
        )?;
        let artifact = io::save_member_result(output_dir, &result).map_err(|source| {
            Error::Persist {
                member: spec.id.clone(),
                path: io::artifact_path(output_dir, &config.name, &spec.id),
                source,
            }
        })?;

        info!(
            ensemble = %config.name,
            member = %spec.id,
            path = %artifact.display(),
            "Member predictions written"
        );
        observer.member_finished(&spec.id, &artifact);
        Ok(artifact)
    };

    let artifacts = if options.jobs != 1 && config.members.len() > 1 {
        let threads = match options.jobs {
            0 => 0,
            n => n.min(config.members.len()),
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|source| Error::ThreadPool { threads, source })?;
        pool.install(|| {
            config
                .members
                .par_iter()
                .map(&infer)
                .collect::<Result<Vec<_>, _>>()
        })?
    } else {
        config
            .members
            .iter()
            .map(&infer)
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(EnsembleRun {
        ensemble: config.name.clone(),
        structures: structures.len(),
        artifacts,
    })
}
