use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::commands::SourceArgs;

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Record source.
    #[command(flatten)]
    pub source: SourceArgs,
}

pub fn run(args: StatsArgs) -> ExitCode {
    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: StatsArgs) -> Result<()> {
    let engine = args.source.load()?;
    let (strings, uuids) = engine.store().dictionary_sizes();

    println!(
        "records: {}   clusters: {}   state: {}",
        engine.record_count(),
        engine.clusters().len(),
        if engine.is_sealed() { "sealed" } else { "open" }
    );
    println!("dictionaries: {strings} strings, {uuids} uuids");
    println!();
    println!("{}", engine.index_stats());

    Ok(())
}
