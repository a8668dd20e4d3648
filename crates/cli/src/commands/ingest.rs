use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use sift_runtime::config::default_image_path;
use sift_runtime::history::{HistoryEvent, HistoryStore, IngestEvent};
use sift_store::{EngineConfig, LogEngine};

use crate::commands::ingest_jsonl;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// JSON-lines record file ("-" for stdin).
    pub input: PathBuf,

    /// Where to write the sealed store image.
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

pub fn run(args: IngestArgs) -> ExitCode {
    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: IngestArgs) -> Result<()> {
    let started = Instant::now();
    let out = args.out.unwrap_or_else(default_image_path);

    let engine = LogEngine::new(EngineConfig::default());
    let accepted = ingest_jsonl(&engine, &args.input)?;

    engine.seal();
    engine
        .write_image(&out)
        .with_context(|| format!("Failed to write store image {}", out.display()))?;

    let elapsed_ms = started.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
    println!(
        "Ingested {accepted} records into {} ({} clusters, {} ms)",
        out.display(),
        engine.clusters().len(),
        elapsed_ms,
    );

    if let Some(history) = HistoryStore::new() {
        history.log_event(HistoryEvent::Ingest(IngestEvent::new(
            args.input.display().to_string(),
            accepted,
            elapsed_ms,
        )));
    }

    Ok(())
}
