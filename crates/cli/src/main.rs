use std::process::ExitCode;

use clap::Parser;

mod commands;
mod printer;

use commands::Cli;
use sift_runtime::logging;

fn main() -> ExitCode {
    logging::init().ok();

    let cli = Cli::parse();
    match cli.command {
        commands::Command::Ingest(args) => commands::ingest::run(args),
        commands::Command::Query(args) => commands::query::run(args),
        commands::Command::Clusters(args) => commands::clusters::run(args),
        commands::Command::Stats(args) => commands::stats::run(args),
        commands::Command::History(args) => commands::history::run(args),
    }
}
