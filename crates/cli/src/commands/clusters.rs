use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::commands::SourceArgs;

#[derive(Debug, Args)]
pub struct ClustersArgs {
    /// Record source.
    #[command(flatten)]
    pub source: SourceArgs,

    /// Maximum number of clusters to display.
    #[arg(long, short = 'n', default_value = "40")]
    pub limit: usize,
}

pub fn run(args: ClustersArgs) -> ExitCode {
    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: ClustersArgs) -> Result<()> {
    let engine = args.source.load()?;
    let clusters = engine.clusters();
    let total = clusters.len();

    println!("{:>8}  {:7}  {:16}  TEMPLATE", "COUNT", "LEVEL", "SOURCE");
    for c in clusters.iter().take(args.limit) {
        println!(
            "{:>8}  {:7}  {:16}  {}",
            c.count,
            format!("{:?}", c.level).to_uppercase(),
            c.source,
            c.template
        );
    }
    if total > args.limit {
        eprintln!("... {} more clusters", total - args.limit);
    }

    Ok(())
}
