use std::io;

use anyhow::{Context, Result};
use tracing::warn;

use ensemble_sigma::ensemble::{EnsembleRun, load_structures, run_ensemble_on};
use ensemble_sigma::{PairPotentialLoader, RunOptions, StudyConfig};

use crate::cli::InferArgs;
use crate::config::load_study;
use crate::display::{Context as DisplayContext, Progress, print_ensemble_info};
use crate::io::structure_format;

pub fn run_infer(args: InferArgs, ctx: DisplayContext) -> Result<()> {
    let study = load_study(&args.study)?;
    infer_study(&study, &args.study.ensembles, args.jobs, ctx)?;
    Ok(())
}

/// Runs every selected ensemble with the built-in pair potential and
/// returns the runs in selection order.
pub fn infer_study(
    study: &StudyConfig,
    names: &[String],
    jobs: usize,
    ctx: DisplayContext,
) -> Result<Vec<EnsembleRun>> {
    let selected = study.select(names)?;
    let mut progress = Progress::new(ctx.interactive, selected.len() * 2);
    let mut runs = Vec::with_capacity(selected.len());

    for ensemble in selected {
        if structure_format(&ensemble.structures).is_none() {
            warn!(
                path = %ensemble.structures.display(),
                "Unrecognised structure file extension, reading as extended XYZ"
            );
        }

        let read_label = format!("Reading structures for '{}'", ensemble.name);
        progress.step(&read_label);
        let structures = load_structures(ensemble)?;
        progress.complete_step(
            &read_label,
            &[format!(
                "{} frames from {}",
                structures.len(),
                ensemble.structures.display()
            )],
        );

        if ctx.interactive {
            print_ensemble_info(&mut io::stderr().lock(), ensemble, &structures);
        }

        let run_label = format!("Running ensemble '{}'", ensemble.name);
        let total = structures.len() * ensemble.members.len();
        progress.step_counted(&run_label, total as u64);
        let run = run_ensemble_on(
            ensemble,
            &structures,
            &PairPotentialLoader,
            &study.output_dir,
            RunOptions { jobs },
            progress.observer(),
        )
        .with_context(|| format!("Inference failed for ensemble '{}'", ensemble.name))?;

        let written: Vec<String> = run
            .artifacts
            .iter()
            .map(|p| format!("Write predictions → {}", p.display()))
            .collect();
        progress.complete_step(&run_label, &written);

        runs.push(run);
    }

    progress.finish();
    Ok(runs)
}
