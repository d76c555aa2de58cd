use std::io;

use anyhow::{Context, Result};

use ensemble_sigma::ensemble::{
    ComparisonRow, LogReporter, Reporter, load_structures, write_points_csv,
};
use ensemble_sigma::{EnsembleConfig, EnsembleSummary, aggregate_ensemble};

use crate::cli::AggregateArgs;
use crate::config::load_study;
use crate::display::{Context as DisplayContext, Progress, print_histogram, print_summary};
use crate::io::create_output;
use crate::util::path::with_label;

pub fn run_aggregate(args: AggregateArgs, ctx: DisplayContext) -> Result<()> {
    let study = load_study(&args.study)?;
    let selected = study.select(&args.study.ensembles)?;
    let labelled = selected.len() > 1;

    let mut progress = Progress::new(ctx.interactive, selected.len());
    let mut log = LogReporter::default();
    let mut out = io::stdout().lock();

    for ensemble in selected {
        let label = format!("Aggregating '{}'", ensemble.name);
        progress.step(&label);

        let summary = summarize(ensemble, &study.output_dir)?;
        let mut substeps = vec![format!(
            "{} members × {} structures ({})",
            summary.members,
            summary.len(),
            summary.property
        )];

        if let Some(points) = &args.points {
            let path = if labelled {
                with_label(points, &ensemble.name)
            } else {
                points.clone()
            };
            let writer = create_output(Some(&path))?;
            write_points_csv(&summary, writer)
                .with_context(|| format!("Failed to write points to {}", path.display()))?;
            substeps.push(format!("Write points → {}", path.display()));
        }

        progress.complete_step(&label, &substeps);

        log.emit(&ComparisonRow::from_summary(&summary, ensemble.reference_sigma))?;
        print_summary(&mut out, &summary, ensemble.reference_sigma);
        print_histogram(&mut out, &summary, args.bins);
    }

    log.finish()?;
    progress.finish();
    Ok(())
}

/// Aggregates one ensemble, checking every artifact against the size of
/// its evaluation set.
pub(super) fn summarize(
    ensemble: &EnsembleConfig,
    dir: &std::path::Path,
) -> Result<EnsembleSummary> {
    let expected = load_structures(ensemble)?.len();
    aggregate_ensemble(ensemble, dir, Some(expected))
        .with_context(|| format!("Aggregation failed for ensemble '{}'", ensemble.name))
}
