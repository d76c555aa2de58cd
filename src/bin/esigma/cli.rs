use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "esigma",
    about = "Ensemble uncertainty estimates for interatomic potentials",
    version,
    author,
    before_help = crate::display::banner_for_help(),
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate every ensemble member and persist its predictions
    #[command(visible_alias = "i")]
    Infer(InferArgs),

    /// Aggregate persisted predictions into per-structure σ
    #[command(visible_alias = "a")]
    Aggregate(AggregateArgs),

    /// Aggregate every selected ensemble and compare against references
    #[command(visible_alias = "c")]
    Compare(CompareArgs),

    /// Infer, then compare, in one go
    Run(RunArgs),
}

/// Options accepted by every command.
#[derive(Args)]
pub struct GlobalOptions {
    /// Suppress progress output (for scripting)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Study selection and overrides shared by all commands.
#[derive(Args)]
#[command(next_help_heading = "Study")]
pub struct StudyOptions {
    /// Study configuration file
    #[arg(short, long, value_name = "FILE", default_value = "study.toml")]
    pub config: PathBuf,

    /// Restrict to the named ensemble, repeatable (default: all)
    #[arg(short, long = "ensemble", value_name = "NAME", action = clap::ArgAction::Append)]
    pub ensembles: Vec<String>,

    /// Directory holding the member prediction artifacts
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Drop forces of atoms with a lower index
    #[arg(long, value_name = "N")]
    pub force_offset: Option<usize>,

    /// Property the spread is computed over
    #[arg(long, value_name = "PROPERTY")]
    pub property: Option<PropertyArg>,
}

#[derive(Args)]
pub struct InferArgs {
    #[command(flatten)]
    pub study: StudyOptions,

    /// Members evaluated concurrently (0 = one per CPU)
    #[arg(short, long, value_name = "N", default_value = "1")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct AggregateArgs {
    #[command(flatten)]
    pub study: StudyOptions,

    /// Write per-structure mean, variance and σ as CSV
    ///
    /// With several ensembles selected the ensemble name is appended to
    /// the file stem.
    #[arg(short, long, value_name = "FILE")]
    pub points: Option<PathBuf>,

    /// Number of histogram bins
    #[arg(long, value_name = "N", default_value = "10")]
    pub bins: usize,
}

#[derive(Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub study: StudyOptions,

    #[command(flatten)]
    pub report: ReportOptions,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub study: StudyOptions,

    /// Members evaluated concurrently (0 = one per CPU)
    #[arg(short, long, value_name = "N", default_value = "1")]
    pub jobs: usize,

    #[command(flatten)]
    pub report: ReportOptions,
}

/// Output options of the comparison report.
#[derive(Args)]
#[command(next_help_heading = "Report")]
pub struct ReportOptions {
    /// Emit the comparison rows as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Relative deviation from the reference tolerated before warning
    #[arg(long, value_name = "FRACTION", default_value = "0.05")]
    pub tolerance: f64,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PropertyArg {
    /// Total energy, baseline-corrected per member
    Energy,
    /// Largest per-atom force magnitude
    #[value(name = "max-force", alias = "fmax")]
    MaxForce,
}

pub fn parse() -> Cli {
    Cli::parse()
}
