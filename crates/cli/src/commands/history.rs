use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Args;

use sift_runtime::history::{HistoryEvent, HistoryStore};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Maximum number of events to display.
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,

    /// Delete the history log instead of printing it.
    #[arg(long)]
    pub clear: bool,
}

pub fn run(args: HistoryArgs) -> ExitCode {
    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: HistoryArgs) -> Result<()> {
    let Some(history) = HistoryStore::new() else {
        bail!("history is disabled (SIFT_HISTORY=0)");
    };

    if args.clear {
        history.clear()?;
        println!("History cleared.");
        return Ok(());
    }

    let events = history.recent(args.limit);
    if events.is_empty() {
        println!("No history yet.");
        return Ok(());
    }

    for event in events {
        match event {
            HistoryEvent::Query(q) => println!(
                "{}  query   {:40}  {} hits  {} ms",
                q.timestamp.format("%Y-%m-%d %H:%M:%S"),
                q.predicate,
                q.hits,
                q.duration_ms
            ),
            HistoryEvent::Ingest(i) => println!(
                "{}  ingest  {:40}  {} records  {} ms",
                i.timestamp.format("%Y-%m-%d %H:%M:%S"),
                i.input,
                i.records,
                i.duration_ms
            ),
        }
    }

    Ok(())
}
