pub mod clusters;
pub mod history;
pub mod ingest;
pub mod query;
pub mod stats;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::warn;

use sift_store::{EngineConfig, LogEngine, NewRecord};

#[derive(Parser, Debug)]
#[command(
    name = "sift",
    version,
    about = "Sift - interactive log and event exploration",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest JSON-lines records, seal, and export a store image.
    ///
    /// Example:
    ///   sift ingest app.jsonl
    ///   sift ingest --out /tmp/store.sift app.jsonl
    Ingest(ingest::IngestArgs),

    /// Search records by substring predicate.
    ///
    /// Example:
    ///   sift query --image /tmp/store.sift 'user login|logout'
    ///   sift query --input app.jsonl --level error 'timeout'
    Query(query::QueryArgs),

    /// Show the learned message templates.
    Clusters(clusters::ClustersArgs),

    /// Show store and index statistics.
    Stats(stats::StatsArgs),

    /// Show past queries and ingests.
    History(history::HistoryArgs),
}

/// Where a command gets its records from: a persisted image or a raw
/// JSON-lines file ingested on the fly.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Persisted store image to open.
    #[arg(long, value_name = "FILE", conflicts_with = "input")]
    pub image: Option<PathBuf>,

    /// JSON-lines record file to ingest ("-" for stdin).
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

impl SourceArgs {
    pub fn load(&self) -> Result<LogEngine> {
        match (&self.image, &self.input) {
            (Some(image), _) => LogEngine::open_image(EngineConfig::default(), image)
                .with_context(|| format!("Failed to open store image {}", image.display())),
            (None, Some(input)) => {
                let engine = LogEngine::new(EngineConfig::default());
                ingest_jsonl(&engine, input)?;
                Ok(engine)
            }
            (None, None) => bail!("one of --image or --input is required"),
        }
    }
}

/// Feed a JSON-lines file into the engine. Malformed lines are skipped
/// with a warning so a single bad record cannot sink a whole ingest.
pub fn ingest_jsonl(engine: &LogEngine, input: &Path) -> Result<usize> {
    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(input)
            .with_context(|| format!("Failed to open input {}", input.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut accepted = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: NewRecord = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!("line {}: skipping malformed record: {e}", lineno + 1);
                continue;
            }
        };
        engine.put(record)?;
        accepted += 1;
    }
    Ok(accepted)
}
