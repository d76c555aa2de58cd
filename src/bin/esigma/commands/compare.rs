use anyhow::{Context, Result};

use ensemble_sigma::ensemble::{ComparisonRow, EnsembleRun, JsonReporter, LogReporter, Reporter};
use ensemble_sigma::{StudyConfig, aggregate_ensemble};

use super::aggregate::summarize;
use crate::cli::{CompareArgs, ReportOptions};
use crate::config::load_study;
use crate::display::{Context as DisplayContext, Progress, TableReporter};
use crate::io::create_output;

pub fn run_compare(args: CompareArgs, ctx: DisplayContext) -> Result<()> {
    let study = load_study(&args.study)?;
    let selected = study.select(&args.study.ensembles)?;

    let mut progress = Progress::new(ctx.interactive, selected.len());
    let mut rows = Vec::with_capacity(selected.len());

    for ensemble in selected {
        let label = format!("Aggregating '{}'", ensemble.name);
        progress.step(&label);
        let summary = summarize(ensemble, &study.output_dir)?;
        progress.complete_step(&label, &[]);
        rows.push(ComparisonRow::from_summary(&summary, ensemble.reference_sigma));
    }

    progress.finish();
    report(&rows, &args.report)
}

/// Compares the ensembles of a run that has just finished; the run already
/// knows the size of each evaluation set.
pub fn compare_study(study: &StudyConfig, runs: &[EnsembleRun], opts: &ReportOptions) -> Result<()> {
    let mut rows = Vec::with_capacity(runs.len());
    for run in runs {
        let ensemble = study.ensemble(&run.ensemble)?;
        let summary = aggregate_ensemble(ensemble, &study.output_dir, Some(run.structures))
            .with_context(|| format!("Aggregation failed for ensemble '{}'", ensemble.name))?;
        rows.push(ComparisonRow::from_summary(&summary, ensemble.reference_sigma));
    }
    report(&rows, opts)
}

fn report(rows: &[ComparisonRow], opts: &ReportOptions) -> Result<()> {
    let out = create_output(None)?;
    let mut sink: Box<dyn Reporter> = if opts.json {
        Box::new(JsonReporter::new(out))
    } else {
        Box::new(TableReporter::new(out))
    };
    let mut log = LogReporter {
        tolerance: opts.tolerance,
    };

    for row in rows {
        log.emit(row)?;
        sink.emit(row)?;
    }

    log.finish()?;
    sink.finish().context("Failed to write comparison report")
}
