mod aggregate;
mod compare;
mod infer;

use aggregate::run_aggregate;
use compare::{compare_study, run_compare};
use infer::{infer_study, run_infer};

use anyhow::Result;

use crate::cli::{Command, RunArgs};
use crate::config::load_study;
use crate::display::Context;

pub fn dispatch(command: Command, ctx: Context) -> Result<()> {
    match command {
        Command::Infer(args) => run_infer(args, ctx),
        Command::Aggregate(args) => run_aggregate(args, ctx),
        Command::Compare(args) => run_compare(args, ctx),
        Command::Run(args) => run_all(args, ctx),
    }
}

fn run_all(args: RunArgs, ctx: Context) -> Result<()> {
    let study = load_study(&args.study)?;
    let runs = infer_study(&study, &args.study.ensembles, args.jobs, ctx)?;
    compare_study(&study, &runs, &args.report)
}
